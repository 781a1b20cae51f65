// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt::{Display, Formatter};

use juju_access_core::{Tag, TagKind, is_valid_uuid};
use serde::{Deserialize, Serialize};

use crate::access::AccessError;
use crate::client::Shared;
use crate::connector::Connector;

/// The resource a grant applies to, before it is resolved to a tag.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AccessTarget {
    /// A model addressed by its UUID.
    Model { uuid: String },

    /// A model addressed by its name, looked up in the model identity cache.
    ModelName { name: String },

    /// Any resource whose tag identifier is a UUID.
    ByUuid { kind: TagKind, uuid: String },

    /// Any resource whose tag identifier is its name, for example clouds or offers.
    ByName { kind: TagKind, name: String },
}

impl AccessTarget {
    pub fn model(uuid: impl Into<String>) -> Self {
        Self::Model { uuid: uuid.into() }
    }

    pub fn model_name(name: impl Into<String>) -> Self {
        Self::ModelName { name: name.into() }
    }

    /// Resolve the target to the tag used in relationship tuples.
    pub async fn resolve<C>(&self, shared: &Shared<C>) -> Result<Tag, AccessError<C>>
    where
        C: Connector,
    {
        match self {
            AccessTarget::Model { uuid } => self.uuid_tag(TagKind::Model, uuid),
            AccessTarget::ByUuid { kind, uuid } => self.uuid_tag(*kind, uuid),
            AccessTarget::ModelName { name } => {
                let uuid = shared
                    .model_uuid(name)
                    .await
                    .map_err(|source| AccessError::Client {
                        operation: "resolve model",
                        target: self.to_string(),
                        source,
                    })?;
                self.uuid_tag(TagKind::Model, &uuid)
            }
            AccessTarget::ByName { kind, name } => {
                Tag::new(*kind, name.as_str()).map_err(|err| self.invalid(err))
            }
        }
    }

    fn uuid_tag<C>(&self, kind: TagKind, uuid: &str) -> Result<Tag, AccessError<C>>
    where
        C: Connector,
    {
        if !is_valid_uuid(uuid) {
            return Err(self.invalid(format!("{uuid:?} is not a valid UUID")));
        }
        Tag::new(kind, uuid).map_err(|err| self.invalid(err))
    }

    fn invalid<C>(&self, reason: impl Display) -> AccessError<C>
    where
        C: Connector,
    {
        AccessError::InvalidTarget {
            target: self.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl Display for AccessTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessTarget::Model { uuid } => write!(f, "model {uuid}"),
            AccessTarget::ModelName { name } => write!(f, "model {name:?}"),
            AccessTarget::ByUuid { kind, uuid } => write!(f, "{kind} {uuid}"),
            AccessTarget::ByName { kind, name } => write!(f, "{kind} {name:?}"),
        }
    }
}
