// SPDX-License-Identifier: MIT OR Apache-2.0

//! Access grants and the set arithmetic used to reconcile them.
//!
//! An [`AccessGrant`] is identified by its target tag and relation and owns three disjoint subject
//! sets: users, groups and service accounts. The relationship tuples stored on the controller are
//! a derived view, built by tagging every member with its kind.
//!
//! Reconciling a grant means computing a [`GrantDelta`] between the previously applied subjects
//! and the desired ones: `to_add = desired \ previous` and `to_remove = previous \ desired`.
//! Members present in both sets are never touched.
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::grant_id::GrantId;
use crate::tag::{
    GROUP_MEMBER_SUFFIX, SERVICE_ACCOUNT_DOMAIN, Tag, TagError, TagKind, reserved_character,
};
use crate::tuple::RelationshipTuple;

/// Kind of subject which can hold a relation on a target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubjectKind {
    User,
    Group,
    ServiceAccount,
}

impl Display for SubjectKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SubjectKind::User => "user",
            SubjectKind::Group => "group",
            SubjectKind::ServiceAccount => "service account",
        };

        write!(f, "{}", s)
    }
}

/// A single subject, holding a bare identifier (never a tag).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Subject {
    kind: SubjectKind,
    id: String,
}

impl Subject {
    pub fn new(kind: SubjectKind, id: impl Into<String>) -> Result<Self, SubjectError> {
        let mut id = id.into();
        if kind == SubjectKind::ServiceAccount
            && let Some(client_id) = id.strip_suffix(SERVICE_ACCOUNT_DOMAIN)
        {
            id = client_id.to_string();
        }
        if id.is_empty() {
            return Err(SubjectError::EmptyIdentifier(kind));
        }
        if let Some(character) = reserved_character(&id) {
            return Err(SubjectError::ReservedCharacter {
                kind,
                id,
                character,
            });
        }

        // The controller would read these back as a different subject.
        let suffix = match kind {
            SubjectKind::User | SubjectKind::ServiceAccount => SERVICE_ACCOUNT_DOMAIN,
            SubjectKind::Group => GROUP_MEMBER_SUFFIX,
        };
        if id.ends_with(suffix) {
            return Err(SubjectError::ReservedSuffix { kind, id, suffix });
        }

        Ok(Self { kind, id })
    }

    pub fn user(id: impl Into<String>) -> Result<Self, SubjectError> {
        Self::new(SubjectKind::User, id)
    }

    pub fn group(id: impl Into<String>) -> Result<Self, SubjectError> {
        Self::new(SubjectKind::Group, id)
    }

    pub fn service_account(id: impl Into<String>) -> Result<Self, SubjectError> {
        Self::new(SubjectKind::ServiceAccount, id)
    }

    pub fn kind(&self) -> SubjectKind {
        self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Tuple object string for this subject.
    ///
    /// Service accounts are a subtype of users on the controller and are rendered as user tags
    /// carrying the service account domain.
    pub fn object(&self) -> String {
        match self.kind {
            SubjectKind::User => format!("{}-{}", TagKind::User, self.id),
            SubjectKind::Group => format!("{}-{}", TagKind::Group, self.id),
            SubjectKind::ServiceAccount => {
                format!("{}-{}{}", TagKind::User, self.id, SERVICE_ACCOUNT_DOMAIN)
            }
        }
    }

    /// Parse a tuple object string back into a subject.
    ///
    /// A user tag whose identifier carries the service account domain is classified as a service
    /// account. A trailing `#member` userset on group tags is ignored.
    pub fn from_object(object: &str) -> Result<Self, SubjectError> {
        let tag = Tag::from_str(object)?;
        match tag.kind() {
            TagKind::User => match tag.id().strip_suffix(SERVICE_ACCOUNT_DOMAIN) {
                Some(client_id) => Self::new(SubjectKind::ServiceAccount, client_id),
                None => Self::new(SubjectKind::User, tag.id()),
            },
            TagKind::Group => {
                let id = tag.id();
                let id = id.strip_suffix(GROUP_MEMBER_SUFFIX).unwrap_or(id);
                Self::new(SubjectKind::Group, id)
            }
            kind => Err(SubjectError::UnsupportedKind(kind)),
        }
    }
}

impl Display for Subject {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.object())
    }
}

/// The three subject sets of a grant.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subjects {
    #[serde(default)]
    users: BTreeSet<String>,
    #[serde(default)]
    groups: BTreeSet<String>,
    #[serde(default)]
    service_accounts: BTreeSet<String>,
}

impl Subjects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build subject sets from bare identifiers. Duplicates collapse.
    pub fn from_parts<U, G, S>(users: U, groups: G, service_accounts: S) -> Result<Self, SubjectError>
    where
        U: IntoIterator,
        U::Item: Into<String>,
        G: IntoIterator,
        G::Item: Into<String>,
        S: IntoIterator,
        S::Item: Into<String>,
    {
        let mut subjects = Self::new();
        for id in users {
            subjects.insert(Subject::user(id)?);
        }
        for id in groups {
            subjects.insert(Subject::group(id)?);
        }
        for id in service_accounts {
            subjects.insert(Subject::service_account(id)?);
        }
        Ok(subjects)
    }

    /// Insert a subject, returns `false` if it was already present.
    pub fn insert(&mut self, subject: Subject) -> bool {
        self.set_mut(subject.kind).insert(subject.id)
    }

    pub fn remove(&mut self, subject: &Subject) -> bool {
        self.set_mut(subject.kind).remove(&subject.id)
    }

    pub fn contains(&self, subject: &Subject) -> bool {
        self.set(subject.kind).contains(&subject.id)
    }

    pub fn users(&self) -> &BTreeSet<String> {
        &self.users
    }

    pub fn groups(&self) -> &BTreeSet<String> {
        &self.groups
    }

    pub fn service_accounts(&self) -> &BTreeSet<String> {
        &self.service_accounts
    }

    pub fn len(&self) -> usize {
        self.users.len() + self.groups.len() + self.service_accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All subjects: users first, then groups, then service accounts, each in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = Subject> + '_ {
        let tagged = |kind: SubjectKind, set: &BTreeSet<String>| {
            set.iter()
                .map(move |id| Subject {
                    kind,
                    id: id.clone(),
                })
                .collect::<Vec<_>>()
        };

        tagged(SubjectKind::User, &self.users)
            .into_iter()
            .chain(tagged(SubjectKind::Group, &self.groups))
            .chain(tagged(SubjectKind::ServiceAccount, &self.service_accounts))
    }

    /// Per-set difference `self \ other`.
    pub fn difference(&self, other: &Subjects) -> Subjects {
        Subjects {
            users: self.users.difference(&other.users).cloned().collect(),
            groups: self.groups.difference(&other.groups).cloned().collect(),
            service_accounts: self
                .service_accounts
                .difference(&other.service_accounts)
                .cloned()
                .collect(),
        }
    }

    /// Per-set union.
    pub fn union(&self, other: &Subjects) -> Subjects {
        Subjects {
            users: self.users.union(&other.users).cloned().collect(),
            groups: self.groups.union(&other.groups).cloned().collect(),
            service_accounts: self
                .service_accounts
                .union(&other.service_accounts)
                .cloned()
                .collect(),
        }
    }

    fn set(&self, kind: SubjectKind) -> &BTreeSet<String> {
        match kind {
            SubjectKind::User => &self.users,
            SubjectKind::Group => &self.groups,
            SubjectKind::ServiceAccount => &self.service_accounts,
        }
    }

    fn set_mut(&mut self, kind: SubjectKind) -> &mut BTreeSet<String> {
        match kind {
            SubjectKind::User => &mut self.users,
            SubjectKind::Group => &mut self.groups,
            SubjectKind::ServiceAccount => &mut self.service_accounts,
        }
    }
}

impl FromIterator<Subject> for Subjects {
    fn from_iter<T: IntoIterator<Item = Subject>>(iter: T) -> Self {
        let mut subjects = Subjects::new();
        for subject in iter {
            subjects.insert(subject);
        }
        subjects
    }
}

/// Subjects to grant and to revoke when moving from one subject set to another.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GrantDelta {
    pub to_add: Subjects,
    pub to_remove: Subjects,
}

impl GrantDelta {
    pub fn between(previous: &Subjects, desired: &Subjects) -> Self {
        Self {
            to_add: desired.difference(previous),
            to_remove: previous.difference(desired),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }

    /// Result of applying this delta to `previous`.
    pub fn apply(&self, previous: &Subjects) -> Subjects {
        previous.union(&self.to_add).difference(&self.to_remove)
    }
}

/// Desired (or observed) state of a single `(target, relation)` grant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrant {
    pub target: Tag,
    pub relation: String,
    pub subjects: Subjects,
}

impl AccessGrant {
    pub fn new(target: Tag, relation: impl Into<String>, subjects: Subjects) -> Self {
        Self {
            target,
            relation: relation.into(),
            subjects,
        }
    }

    /// One tuple per subject.
    pub fn tuples(&self) -> Vec<RelationshipTuple> {
        self.tuples_for(&self.subjects)
    }

    /// Tuples granting this grant's relation on its target to the given subjects.
    pub fn tuples_for(&self, subjects: &Subjects) -> Vec<RelationshipTuple> {
        let target = self.target.to_string();
        subjects
            .iter()
            .map(|subject| RelationshipTuple::new(subject.object(), &self.relation, &target))
            .collect()
    }

    pub fn id(&self) -> GrantId {
        GrantId::from(self)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubjectError {
    #[error("invalid subject tag: {0}")]
    InvalidTag(#[from] TagError),

    #[error("{0} tags can not hold access relations")]
    UnsupportedKind(TagKind),

    #[error("{0} identifier is empty")]
    EmptyIdentifier(SubjectKind),

    #[error("{kind} identifier {id:?} contains reserved character {character:?}")]
    ReservedCharacter {
        kind: SubjectKind,
        id: String,
        character: char,
    },

    #[error("{kind} identifier {id:?} must not end with {suffix:?}")]
    ReservedSuffix {
        kind: SubjectKind,
        id: String,
        suffix: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::tag::{Tag, TagKind};
    use crate::tuple::RelationshipTuple;

    use super::{AccessGrant, GrantDelta, Subject, SubjectError, SubjectKind, Subjects};

    fn subjects(users: &[&str], groups: &[&str], service_accounts: &[&str]) -> Subjects {
        Subjects::from_parts(
            users.iter().copied(),
            groups.iter().copied(),
            service_accounts.iter().copied(),
        )
        .unwrap()
    }

    #[rstest]
    #[case("user-alice@serviceaccount", SubjectKind::ServiceAccount, "alice")]
    #[case("user-bob", SubjectKind::User, "bob")]
    #[case("group-admins", SubjectKind::Group, "admins")]
    #[case("group-admins#member", SubjectKind::Group, "admins")]
    fn classify_tuple_objects(#[case] object: &str, #[case] kind: SubjectKind, #[case] id: &str) {
        let subject = Subject::from_object(object).unwrap();
        assert_eq!(subject.kind(), kind);
        assert_eq!(subject.id(), id);
    }

    #[test]
    fn reject_non_subject_objects() {
        assert_eq!(
            Subject::from_object("model-1234"),
            Err(SubjectError::UnsupportedKind(TagKind::Model))
        );
        assert!(matches!(
            Subject::from_object("nonsense"),
            Err(SubjectError::InvalidTag(_))
        ));
        assert_eq!(
            Subject::from_object("user-@serviceaccount"),
            Err(SubjectError::EmptyIdentifier(SubjectKind::ServiceAccount))
        );
    }

    #[test]
    fn service_account_domain_is_not_doubled() {
        let plain = Subject::service_account("ci").unwrap();
        let suffixed = Subject::service_account("ci@serviceaccount").unwrap();
        assert_eq!(plain, suffixed);
        assert_eq!(plain.object(), "user-ci@serviceaccount");
    }

    #[rstest]
    #[case(SubjectKind::User, "ci@serviceaccount", "@serviceaccount")]
    #[case(SubjectKind::ServiceAccount, "ci@serviceaccount@serviceaccount", "@serviceaccount")]
    #[case(SubjectKind::Group, "admins#member", "#member")]
    fn reject_identifiers_read_back_as_other_subjects(
        #[case] kind: SubjectKind,
        #[case] id: &str,
        #[case] suffix: &str,
    ) {
        assert!(matches!(
            Subject::new(kind, id),
            Err(SubjectError::ReservedSuffix { suffix: found, .. }) if found == suffix
        ));
    }

    #[rstest]
    #[case(SubjectKind::User, "a,b", ',')]
    #[case(SubjectKind::Group, "ops:eu", ':')]
    #[case(SubjectKind::ServiceAccount, "ci,cd", ',')]
    fn reject_reserved_characters(
        #[case] kind: SubjectKind,
        #[case] id: &str,
        #[case] character: char,
    ) {
        assert_eq!(
            Subject::new(kind, id),
            Err(SubjectError::ReservedCharacter {
                kind,
                id: id.to_string(),
                character,
            })
        );
    }

    #[rstest]
    #[case(SubjectKind::User, "alice")]
    #[case(SubjectKind::User, "ops#member")]
    #[case(SubjectKind::Group, "admins")]
    #[case(SubjectKind::Group, "partners@serviceaccount")]
    #[case(SubjectKind::ServiceAccount, "ci")]
    #[case(SubjectKind::ServiceAccount, "ci#member")]
    fn objects_read_back_as_the_same_subject(#[case] kind: SubjectKind, #[case] id: &str) {
        let subject = Subject::new(kind, id).unwrap();
        assert_eq!(Subject::from_object(&subject.object()), Ok(subject));
    }

    #[test]
    fn same_identifier_in_different_sets() {
        let subjects = subjects(&["ops"], &["ops"], &["ops"]);
        assert_eq!(subjects.len(), 3);
        let objects: Vec<String> = subjects.iter().map(|subject| subject.object()).collect();
        assert_eq!(
            objects,
            vec!["user-ops", "group-ops", "user-ops@serviceaccount"]
        );
    }

    #[test]
    fn tuples_are_tagged_by_kind() {
        let grant = AccessGrant::new(
            Tag::model("1234").unwrap(),
            "reader",
            subjects(&["alice"], &["admins"], &["ci"]),
        );
        assert_eq!(
            grant.tuples(),
            vec![
                RelationshipTuple::new("user-alice", "reader", "model-1234"),
                RelationshipTuple::new("group-admins", "reader", "model-1234"),
                RelationshipTuple::new("user-ci@serviceaccount", "reader", "model-1234"),
            ]
        );
    }

    #[rstest]
    #[case(&[], &["alice", "bob"])]
    #[case(&["alice", "bob"], &[])]
    #[case(&["alice", "bob"], &["bob", "carol"])]
    #[case(&["alice"], &["alice"])]
    fn delta_reaches_desired_state(#[case] previous: &[&str], #[case] desired: &[&str]) {
        let previous = subjects(previous, &["admins"], &[]);
        let desired = subjects(desired, &[], &["ci"]);
        let delta = GrantDelta::between(&previous, &desired);

        assert_eq!(delta.to_add, desired.difference(&previous));
        assert_eq!(delta.to_remove, previous.difference(&desired));
        assert_eq!(delta.apply(&previous), desired);

        for subject in delta.to_add.iter() {
            assert!(!delta.to_remove.contains(&subject));
        }
    }

    #[test]
    fn unchanged_subjects_are_untouched() {
        let previous = subjects(&["alice", "bob"], &["admins"], &[]);
        let desired = subjects(&["bob", "alice"], &["admins"], &[]);
        assert!(GrantDelta::between(&previous, &desired).is_empty());

        let desired = subjects(&["bob", "carol"], &["admins"], &[]);
        let delta = GrantDelta::between(&previous, &desired);
        assert_eq!(delta.to_add, subjects(&["carol"], &[], &[]));
        assert_eq!(delta.to_remove, subjects(&["alice"], &[], &[]));
    }
}
