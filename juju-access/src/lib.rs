// SPDX-License-Identifier: MIT OR Apache-2.0

//! Declarative access grants for Juju and JAAS controllers.
//!
//! An [`AccessEngine`] converges the relationship tuples stored on a controller towards a desired
//! set of users, groups and service accounts holding a relation on a target. The transport to the
//! controller is supplied by the caller through the [`Connector`] and [`Session`] traits.
pub mod access;
pub mod cache;
pub mod capability;
pub mod client;
pub mod config;
pub mod connector;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub use access::{
    AccessEngine, AccessError, AccessTarget, AppliedChanges, GrantSnapshot, SkippedTuple,
};
pub use cache::ModelCache;
pub use capability::{
    AvoidJaas, CapabilityGate, CapabilityValidator, Diagnostic, RequiresJaas, Severity,
};
pub use client::{Client, ClientError, Shared, TupleClient};
pub use config::{ConfigError, ControllerConfig, DialOptions};
pub use connector::{Connector, Session, SessionGuard, TuplePage};
pub use juju_access_core::{
    AccessGrant, GrantDelta, GrantId, GrantIdError, ModelIdentity, ModelSummary, ModelType,
    RelationshipTuple, Subject, SubjectKind, Subjects, Tag, TagKind, TupleFilter,
};
