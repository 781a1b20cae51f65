// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::tag::TagKind;

/// Kind of substrate a model is deployed on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    /// Machine models.
    Iaas,

    /// Kubernetes models.
    Caas,
}

impl Display for ModelType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ModelType::Iaas => "iaas",
            ModelType::Caas => "caas",
        };

        write!(f, "{}", s)
    }
}

/// Summary of a model as listed by the controller's model manager.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub name: String,
    pub uuid: String,
    /// Owner as a user tag, for example `user-admin`.
    pub owner_tag: String,
    pub model_type: ModelType,
}

/// Stable identity of a model, keyed by name for lookups.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelIdentity {
    pub name: String,
    pub owner: String,
    pub uuid: String,
    pub model_type: ModelType,
}

impl ModelIdentity {
    pub fn new(
        name: impl Into<String>,
        owner: impl Into<String>,
        uuid: impl Into<String>,
        model_type: ModelType,
    ) -> Self {
        Self {
            name: name.into(),
            owner: owner.into(),
            uuid: uuid.into(),
            model_type,
        }
    }
}

impl From<ModelSummary> for ModelIdentity {
    fn from(summary: ModelSummary) -> Self {
        let user_prefix = format!("{}-", TagKind::User);
        let owner = match summary.owner_tag.strip_prefix(&user_prefix) {
            Some(owner) => owner.to_string(),
            None => summary.owner_tag,
        };

        Self {
            name: summary.name,
            owner,
            uuid: summary.uuid,
            model_type: summary.model_type,
        }
    }
}
