// SPDX-License-Identifier: MIT OR Apache-2.0

//! Composite identifier persisted for an applied grant.
//!
//! Format: `<target-tag>:<relation>:<subject,subject,...>` where every subject is rendered as its
//! tuple object string and the list is sorted. The identifier carries enough state to re-derive
//! the expected grant on a later read or import.
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::grant::{AccessGrant, Subject, SubjectError, Subjects};
use crate::tag::{Tag, TagError};

const PART_SEPARATOR: char = ':';
const SUBJECT_SEPARATOR: &str = ",";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrantId {
    target: Tag,
    relation: String,
    subjects: Subjects,
}

impl GrantId {
    pub fn target(&self) -> &Tag {
        &self.target
    }

    pub fn relation(&self) -> &str {
        &self.relation
    }

    pub fn subjects(&self) -> &Subjects {
        &self.subjects
    }

    /// The grant this identifier was derived from.
    pub fn to_grant(&self) -> AccessGrant {
        AccessGrant::new(
            self.target.clone(),
            self.relation.clone(),
            self.subjects.clone(),
        )
    }
}

impl From<&AccessGrant> for GrantId {
    fn from(grant: &AccessGrant) -> Self {
        Self {
            target: grant.target.clone(),
            relation: grant.relation.clone(),
            subjects: grant.subjects.clone(),
        }
    }
}

impl Display for GrantId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut objects: Vec<String> = self.subjects.iter().map(|s| s.object()).collect();
        objects.sort();
        write!(
            f,
            "{}{}{}{}{}",
            self.target,
            PART_SEPARATOR,
            self.relation,
            PART_SEPARATOR,
            objects.join(SUBJECT_SEPARATOR)
        )
    }
}

impl FromStr for GrantId {
    type Err = GrantIdError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = value.split(PART_SEPARATOR).collect();
        let [target, relation, subjects] = parts[..] else {
            return Err(GrantIdError::Malformed(value.to_string()));
        };

        if relation.is_empty() {
            return Err(GrantIdError::Malformed(value.to_string()));
        }

        let target = Tag::from_str(target)?;
        let subjects = subjects
            .split(SUBJECT_SEPARATOR)
            .filter(|object| !object.is_empty())
            .map(|object| {
                Subject::from_object(object).map_err(|source| GrantIdError::InvalidSubject {
                    object: object.to_string(),
                    source,
                })
            })
            .collect::<Result<Subjects, _>>()?;

        Ok(Self {
            target,
            relation: relation.to_string(),
            subjects,
        })
    }
}

impl Serialize for GrantId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for GrantId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        GrantId::from_str(&value).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Error)]
pub enum GrantIdError {
    #[error("malformed grant id {0:?}, please use format '<target-tag>:<relation>:<subject1,subject2>'")]
    Malformed(String),

    #[error("invalid target in grant id: {0}")]
    InvalidTarget(#[from] TagError),

    #[error("invalid subject {object:?} in grant id: {source}")]
    InvalidSubject {
        object: String,
        #[source]
        source: SubjectError,
    },
}
