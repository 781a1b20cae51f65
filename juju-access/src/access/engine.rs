// SPDX-License-Identifier: MIT OR Apache-2.0

use std::str::FromStr;

use juju_access_core::tag::RESERVED_CHARACTERS;
use juju_access_core::{
    AccessGrant, GrantDelta, GrantId, RelationshipTuple, Subject, Subjects, Tag, TupleFilter,
};
use tracing::{debug, warn};

use crate::access::{AccessError, AccessTarget, AppliedChanges, GrantSnapshot, SkippedTuple};
use crate::capability::RequiresJaas;
use crate::client::{Client, ClientError};
use crate::connector::Connector;

/// Drives the lifecycle of access grants on a JAAS controller.
///
/// Every operation refuses to run unless the controller offers the relationship API. A grant
/// must only be mutated by one caller at a time.
#[derive(Debug)]
pub struct AccessEngine<C>
where
    C: Connector,
{
    client: Client<C>,
}

impl<C> Clone for AccessEngine<C>
where
    C: Connector,
{
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
        }
    }
}

impl<C> AccessEngine<C>
where
    C: Connector,
{
    pub fn new(client: Client<C>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client<C> {
        &self.client
    }

    /// Build the desired grant for a target which still needs to be resolved to a tag.
    pub async fn resolve_grant(
        &self,
        target: &AccessTarget,
        relation: &str,
        subjects: Subjects,
    ) -> Result<AccessGrant, AccessError<C>> {
        self.require_capability("resolve grant").await?;
        check_relation(relation)?;

        let tag = target.resolve(self.client.shared()).await?;
        Ok(AccessGrant::new(tag, relation, subjects))
    }

    /// Grant the relation to every subject of `grant` in a single batch.
    ///
    /// Returns the identifier under which the caller persists the grant. Calling this again with
    /// the same grant is harmless.
    pub async fn create(&self, grant: &AccessGrant) -> Result<GrantId, AccessError<C>> {
        self.require_capability("create grant").await?;
        check_relation(&grant.relation)?;

        let tuples = grant.tuples();
        self.grant_tuples(grant, "create grant", &tuples).await?;

        Ok(grant.id())
    }

    /// Read the subjects currently holding `relation` on `target`.
    ///
    /// Tuples whose object is not a subject tag are skipped and reported, the rest of the listing
    /// is still returned.
    pub async fn read(&self, target: &Tag, relation: &str) -> Result<GrantSnapshot, AccessError<C>> {
        self.require_capability("read grant").await?;
        check_relation(relation)?;

        let filter = TupleFilter::relation_on(target.to_string(), relation);
        let tuples = self
            .client
            .tuples()
            .read_tuples(&filter)
            .await
            .map_err(|source| AccessError::Client {
                operation: "read grant",
                target: target.to_string(),
                source,
            })?;

        let mut subjects = Subjects::new();
        let mut skipped = Vec::new();
        for tuple in tuples {
            match Subject::from_object(&tuple.object) {
                Ok(subject) => {
                    subjects.insert(subject);
                }
                Err(err) => {
                    warn!(%tuple, %err, "skipping tuple without a subject object");
                    skipped.push(SkippedTuple {
                        tuple,
                        reason: err.to_string(),
                    });
                }
            }
        }

        debug!(%target, relation, subjects = subjects.len(), "read grant");
        Ok(GrantSnapshot {
            grant: AccessGrant::new(target.clone(), relation, subjects),
            skipped,
        })
    }

    /// Move a grant from its previously applied state to the desired one.
    ///
    /// Subjects which are in both states are not touched. If only the relation changed, every
    /// desired subject is granted the new relation and every previous subject loses the old one.
    /// The add batch is always applied first. When it succeeds but the remove batch fails,
    /// [`AccessError::PartialApply`] carries the tuples which still need to be revoked.
    pub async fn update(
        &self,
        previous: &AccessGrant,
        desired: &AccessGrant,
    ) -> Result<AppliedChanges, AccessError<C>> {
        self.require_capability("update grant").await?;
        check_relation(&previous.relation)?;
        check_relation(&desired.relation)?;
        if previous.target != desired.target {
            return Err(AccessError::TargetChanged {
                previous: previous.target.clone(),
                desired: desired.target.clone(),
            });
        }

        let changes = if previous.relation == desired.relation {
            let delta = GrantDelta::between(&previous.subjects, &desired.subjects);
            AppliedChanges {
                added: desired.tuples_for(&delta.to_add),
                removed: previous.tuples_for(&delta.to_remove),
            }
        } else {
            AppliedChanges {
                added: desired.tuples(),
                removed: previous.tuples(),
            }
        };

        if changes.is_empty() {
            debug!(target = %desired.target, relation = %desired.relation, "grant unchanged");
            return Ok(changes);
        }

        self.grant_tuples(desired, "update grant", &changes.added)
            .await?;

        if let Err(source) = self.remove(&changes.removed).await {
            warn!(
                target = %previous.target,
                relation = %previous.relation,
                pending = changes.removed.len(),
                "granted new subjects but failed to revoke old ones"
            );
            return Err(AccessError::PartialApply {
                target: previous.target.clone(),
                relation: previous.relation.clone(),
                pending: changes.removed,
                source,
            });
        }

        Ok(changes)
    }

    /// Revoke the relation from every subject of `grant` in a single batch.
    ///
    /// Deleting a grant which is already gone is not an error.
    pub async fn delete(&self, grant: &AccessGrant) -> Result<(), AccessError<C>> {
        self.require_capability("delete grant").await?;
        check_relation(&grant.relation)?;

        self.remove(&grant.tuples())
            .await
            .map_err(|source| AccessError::Client {
                operation: "delete grant",
                target: grant.target.to_string(),
                source,
            })
    }

    /// Retry the remove batch left behind by a partially applied update.
    pub async fn revoke(&self, tuples: &[RelationshipTuple]) -> Result<(), AccessError<C>> {
        self.require_capability("revoke tuples").await?;

        self.remove(tuples)
            .await
            .map_err(|source| AccessError::Client {
                operation: "revoke tuples",
                target: revoke_target(tuples),
                source,
            })
    }

    /// Re-derive the expected grant from a persisted grant identifier.
    pub async fn import(&self, id: &str) -> Result<AccessGrant, AccessError<C>> {
        self.require_capability("import grant").await?;

        let id = GrantId::from_str(id)?;
        Ok(id.to_grant())
    }

    async fn require_capability(&self, operation: &'static str) -> Result<(), AccessError<C>> {
        match self.client.validate(&RequiresJaas).await {
            Some(diagnostic) if diagnostic.is_error() => {
                Err(AccessError::CapabilityRequired { operation })
            }
            _ => Ok(()),
        }
    }

    async fn grant_tuples(
        &self,
        grant: &AccessGrant,
        operation: &'static str,
        tuples: &[RelationshipTuple],
    ) -> Result<(), AccessError<C>> {
        if tuples.is_empty() {
            return Ok(());
        }

        debug!(target = %grant.target, relation = %grant.relation, tuples = tuples.len(), "granting");
        self.client
            .tuples()
            .add_tuples(tuples)
            .await
            .map_err(|source| AccessError::Client {
                operation,
                target: grant.target.to_string(),
                source,
            })
    }

    async fn remove(&self, tuples: &[RelationshipTuple]) -> Result<(), ClientError<C>> {
        if tuples.is_empty() {
            return Ok(());
        }

        debug!(tuples = tuples.len(), "revoking");
        self.client.tuples().remove_tuples(tuples).await
    }
}

fn check_relation<C>(relation: &str) -> Result<(), AccessError<C>>
where
    C: Connector,
{
    if relation.is_empty() {
        return Err(AccessError::EmptyRelation);
    }
    if relation.contains(RESERVED_CHARACTERS) {
        return Err(AccessError::InvalidRelation(relation.to_string()));
    }
    Ok(())
}

fn revoke_target(tuples: &[RelationshipTuple]) -> String {
    match tuples.first() {
        Some(tuple) => tuple.target_object.clone(),
        None => String::new(),
    }
}
