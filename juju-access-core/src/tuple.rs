// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// A directed edge stating that `object` holds `relation` on `target_object`.
///
/// Both ends are opaque tag strings. The controller is the only store of tuples, this type is
/// never persisted client-side.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationshipTuple {
    pub object: String,
    pub relation: String,
    pub target_object: String,
}

impl RelationshipTuple {
    pub fn new(
        object: impl Into<String>,
        relation: impl Into<String>,
        target_object: impl Into<String>,
    ) -> Self {
        Self {
            object: object.into(),
            relation: relation.into(),
            target_object: target_object.into(),
        }
    }
}

impl Display for RelationshipTuple {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}, {}, {})",
            self.object, self.relation, self.target_object
        )
    }
}

/// Match pattern for listing tuples. Unset fields match anything.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TupleFilter {
    pub object: Option<String>,
    pub relation: Option<String>,
    pub target_object: Option<String>,
}

impl TupleFilter {
    /// All tuples granting `relation` on `target_object`.
    pub fn relation_on(target_object: impl Into<String>, relation: impl Into<String>) -> Self {
        Self {
            object: None,
            relation: Some(relation.into()),
            target_object: Some(target_object.into()),
        }
    }

    pub fn matches(&self, tuple: &RelationshipTuple) -> bool {
        fn field(pattern: &Option<String>, value: &str) -> bool {
            pattern.as_deref().is_none_or(|pattern| pattern == value)
        }

        field(&self.object, &tuple.object)
            && field(&self.relation, &tuple.relation)
            && field(&self.target_object, &tuple.target_object)
    }
}
