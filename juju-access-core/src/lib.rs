// SPDX-License-Identifier: MIT OR Apache-2.0

//! Data types shared by every part of the access reconciliation stack.
//!
//! Nothing in this crate performs I/O. Tags, tuples, grants and model identities are plain values
//! which the `juju-access` client moves between the caller and the controller.
pub mod grant;
pub mod grant_id;
pub mod model;
pub mod tag;
pub mod tuple;

pub use grant::{AccessGrant, GrantDelta, Subject, SubjectError, SubjectKind, Subjects};
pub use grant_id::{GrantId, GrantIdError};
pub use model::{ModelIdentity, ModelSummary, ModelType};
pub use tag::{Tag, TagError, TagKind, is_valid_uuid};
pub use tuple::{RelationshipTuple, TupleFilter};
