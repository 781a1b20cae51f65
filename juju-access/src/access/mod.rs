// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reconciliation of access grants against the controller's relationship tuples.
//!
//! A grant moves through `Absent -> Created -> Applied -> Updated* -> Absent`. Creating and
//! deleting issue one batch each. Updating computes the delta between the previously applied and
//! the desired subjects and issues the add batch before the remove batch, so a subject is briefly
//! granted too much rather than too little. The controller treats adding an existing tuple and
//! removing an absent one as no-ops, which makes blind retries of every batch safe.
mod engine;
mod target;

use juju_access_core::{AccessGrant, GrantIdError, RelationshipTuple, Tag};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::client::ClientError;
use crate::connector::Connector;

pub use engine::AccessEngine;
pub use target::AccessTarget;

/// Grant as observed on the controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrantSnapshot {
    pub grant: AccessGrant,

    /// Tuples which matched the grant but could not be read back as a subject.
    pub skipped: Vec<SkippedTuple>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedTuple {
    pub tuple: RelationshipTuple,
    pub reason: String,
}

/// Tuple batches issued by an update, in the order they were applied.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AppliedChanges {
    pub added: Vec<RelationshipTuple>,
    pub removed: Vec<RelationshipTuple>,
}

impl AppliedChanges {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum AccessError<C>
where
    C: Connector,
{
    #[error("{operation} is only supported by JAAS controllers")]
    CapabilityRequired { operation: &'static str },

    #[error("invalid target {target}: {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("relation must not be empty")]
    EmptyRelation,

    #[error("relation {0:?} must not contain ':' or ','")]
    InvalidRelation(String),

    #[error("target of a grant can not change from {previous} to {desired}")]
    TargetChanged { previous: Tag, desired: Tag },

    #[error("{operation} on {target} failed: {source}")]
    Client {
        operation: &'static str,
        target: String,
        #[source]
        source: ClientError<C>,
    },

    /// The add batch was applied but the remove batch was not. `pending` holds the tuples which
    /// still need to be revoked.
    #[error(
        "granted {relation} on {target} but revoking {} tuples failed: {source}",
        .pending.len()
    )]
    PartialApply {
        target: Tag,
        relation: String,
        pending: Vec<RelationshipTuple>,
        #[source]
        source: ClientError<C>,
    },

    #[error(transparent)]
    GrantId(#[from] GrantIdError),
}
