// SPDX-License-Identifier: MIT OR Apache-2.0

//! Entity tags in the `<kind>-<identifier>` form used by the controller.
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Domain suffix the controller appends to user identifiers which belong to service accounts.
pub const SERVICE_ACCOUNT_DOMAIN: &str = "@serviceaccount";

/// Relation suffix which marks a group tag as "all members of this group".
pub const GROUP_MEMBER_SUFFIX: &str = "#member";

/// Characters which separate the parts of a grant identifier and can not appear in identifiers.
pub const RESERVED_CHARACTERS: [char; 2] = [':', ','];

const SEPARATOR: char = '-';

/// Kinds of entities which can appear on either side of a relationship tuple.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagKind {
    User,
    Group,
    Model,
    Cloud,
    Controller,
    Application,
    ApplicationOffer,
    Charm,
    Machine,
    Storage,
}

impl TagKind {
    // Longer prefixes first so "applicationoffer-x" is never read as an application.
    const ALL: [TagKind; 10] = [
        TagKind::ApplicationOffer,
        TagKind::Application,
        TagKind::Controller,
        TagKind::Machine,
        TagKind::Storage,
        TagKind::Group,
        TagKind::Model,
        TagKind::Cloud,
        TagKind::Charm,
        TagKind::User,
    ];

    pub fn prefix(&self) -> &'static str {
        match self {
            TagKind::User => "user",
            TagKind::Group => "group",
            TagKind::Model => "model",
            TagKind::Cloud => "cloud",
            TagKind::Controller => "controller",
            TagKind::Application => "application",
            TagKind::ApplicationOffer => "applicationoffer",
            TagKind::Charm => "charm",
            TagKind::Machine => "machine",
            TagKind::Storage => "storage",
        }
    }
}

impl Display for TagKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.prefix())
    }
}

impl FromStr for TagKind {
    type Err = TagError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        TagKind::ALL
            .into_iter()
            .find(|kind| kind.prefix() == value)
            .ok_or_else(|| TagError::UnknownKind(value.to_string()))
    }
}

/// A typed reference to a controller entity, rendered as `<kind>-<identifier>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag {
    kind: TagKind,
    id: String,
}

impl Tag {
    pub fn new(kind: TagKind, id: impl Into<String>) -> Result<Self, TagError> {
        let id = id.into();
        if id.is_empty() {
            return Err(TagError::EmptyIdentifier(kind));
        }
        if let Some(character) = reserved_character(&id) {
            return Err(TagError::ReservedCharacter { kind, id, character });
        }
        Ok(Self { kind, id })
    }

    pub fn user(id: impl Into<String>) -> Result<Self, TagError> {
        Self::new(TagKind::User, id)
    }

    pub fn group(id: impl Into<String>) -> Result<Self, TagError> {
        Self::new(TagKind::Group, id)
    }

    pub fn model(uuid: impl Into<String>) -> Result<Self, TagError> {
        Self::new(TagKind::Model, uuid)
    }

    pub fn kind(&self) -> TagKind {
        self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Display for Tag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.kind.prefix(), SEPARATOR, self.id)
    }
}

impl FromStr for Tag {
    type Err = TagError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.is_empty() {
            return Err(TagError::EmptyString);
        }

        for kind in TagKind::ALL {
            let Some(rest) = value.strip_prefix(kind.prefix()) else {
                continue;
            };
            let Some(id) = rest.strip_prefix(SEPARATOR) else {
                continue;
            };
            return Tag::new(kind, id);
        }

        match value.split_once(SEPARATOR) {
            Some((kind, _)) => Err(TagError::UnknownKind(kind.to_string())),
            None => Err(TagError::MissingSeparator(value.to_string())),
        }
    }
}

impl TryFrom<&str> for Tag {
    type Error = TagError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl Serialize for Tag {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Tag {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Tag::from_str(&value).map_err(serde::de::Error::custom)
    }
}

/// First reserved character in `id`, if any.
pub(crate) fn reserved_character(id: &str) -> Option<char> {
    id.chars().find(|c| RESERVED_CHARACTERS.contains(c))
}

/// Returns `true` if the value looks like a controller UUID.
pub fn is_valid_uuid(value: &str) -> bool {
    static UUID_REGEX: Lazy<Regex> = Lazy::new(|| {
        // Unwrap as we checked the regular expression for correctness
        Regex::new(r"^[\w]{8}(?:-[\w]{4}){3}-[\w]{12}$").unwrap()
    });

    UUID_REGEX.is_match(value)
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TagError {
    #[error("tag is empty")]
    EmptyString,

    #[error("tag {0:?} has no kind separator")]
    MissingSeparator(String),

    #[error("unknown tag kind {0:?}")]
    UnknownKind(String),

    #[error("{0} tag has an empty identifier")]
    EmptyIdentifier(TagKind),

    #[error("{kind} identifier {id:?} contains reserved character {character:?}")]
    ReservedCharacter {
        kind: TagKind,
        id: String,
        character: char,
    },
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rstest::rstest;

    use super::{Tag, TagError, TagKind, is_valid_uuid};

    #[rstest]
    #[case("user-alice", TagKind::User, "alice")]
    #[case("group-admins", TagKind::Group, "admins")]
    #[case(
        "model-2f0b4a56-1c1f-4c76-8fd4-7c5a01b2a7e3",
        TagKind::Model,
        "2f0b4a56-1c1f-4c76-8fd4-7c5a01b2a7e3"
    )]
    #[case("applicationoffer-db", TagKind::ApplicationOffer, "db")]
    #[case("application-db", TagKind::Application, "db")]
    #[case("user-bob@serviceaccount", TagKind::User, "bob@serviceaccount")]
    fn parse_tags(#[case] value: &str, #[case] kind: TagKind, #[case] id: &str) {
        let tag = Tag::from_str(value).unwrap();
        assert_eq!(tag.kind(), kind);
        assert_eq!(tag.id(), id);
        assert_eq!(tag.to_string(), value);
    }

    #[rstest]
    #[case("", TagError::EmptyString)]
    #[case("alice", TagError::MissingSeparator("alice".into()))]
    #[case("robot-alice", TagError::UnknownKind("robot".into()))]
    #[case("user-", TagError::EmptyIdentifier(TagKind::User))]
    #[case(
        "user-a,b",
        TagError::ReservedCharacter { kind: TagKind::User, id: "a,b".into(), character: ',' }
    )]
    #[case(
        "cloud-aws:east",
        TagError::ReservedCharacter { kind: TagKind::Cloud, id: "aws:east".into(), character: ':' }
    )]
    fn reject_malformed_tags(#[case] value: &str, #[case] expected: TagError) {
        assert_eq!(Tag::from_str(value), Err(expected));
    }

    #[test]
    fn serde_as_string() {
        let tag = Tag::group("admins").unwrap();
        let json = serde_json::to_string(&tag).unwrap();
        assert_eq!(json, "\"group-admins\"");
        let tag_again: Tag = serde_json::from_str(&json).unwrap();
        assert_eq!(tag, tag_again);
    }

    #[test]
    fn uuid_validation() {
        assert!(is_valid_uuid("2f0b4a56-1c1f-4c76-8fd4-7c5a01b2a7e3"));
        assert!(!is_valid_uuid("2f0b4a56"));
        assert!(!is_valid_uuid("my-model"));
    }
}
