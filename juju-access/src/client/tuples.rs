// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;

use juju_access_core::{RelationshipTuple, TupleFilter};
use tracing::{debug, trace};

use crate::client::ClientError;
use crate::client::shared::Shared;
use crate::connector::{Connector, Session};

/// Add, remove and list relationship tuples on a JAAS controller.
#[derive(Debug)]
pub struct TupleClient<C>
where
    C: Connector,
{
    shared: Arc<Shared<C>>,
}

impl<C> Clone for TupleClient<C>
where
    C: Connector,
{
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<C> TupleClient<C>
where
    C: Connector,
{
    pub(crate) fn new(shared: Arc<Shared<C>>) -> Self {
        Self { shared }
    }

    pub async fn add_tuples(&self, tuples: &[RelationshipTuple]) -> Result<(), ClientError<C>> {
        debug!(tuples = tuples.len(), "adding relationship tuples");
        let session = self.shared.dial(None).await?;
        let result = session.add_tuples(tuples).await;
        session.close().await;

        result.map_err(|source| ClientError::Remote {
            operation: "add tuples",
            source,
        })
    }

    pub async fn remove_tuples(&self, tuples: &[RelationshipTuple]) -> Result<(), ClientError<C>> {
        debug!(tuples = tuples.len(), "removing relationship tuples");
        let session = self.shared.dial(None).await?;
        let result = session.remove_tuples(tuples).await;
        session.close().await;

        result.map_err(|source| ClientError::Remote {
            operation: "remove tuples",
            source,
        })
    }

    /// List every tuple matching the filter.
    ///
    /// Pages are requested until the controller returns an empty continuation token and only the
    /// complete result is returned. Item errors reported on any page fail the whole listing.
    pub async fn read_tuples(
        &self,
        filter: &TupleFilter,
    ) -> Result<Vec<RelationshipTuple>, ClientError<C>> {
        let session = self.shared.dial(None).await?;
        let result = Self::collect_pages(&*session, filter).await;
        session.close().await;
        result
    }

    async fn collect_pages(
        session: &C::Session,
        filter: &TupleFilter,
    ) -> Result<Vec<RelationshipTuple>, ClientError<C>> {
        let mut tuples = Vec::new();
        let mut continuation_token = String::new();

        loop {
            let page = session
                .list_tuples(filter, &continuation_token)
                .await
                .map_err(|source| ClientError::Remote {
                    operation: "list tuples",
                    source,
                })?;

            if !page.errors.is_empty() {
                return Err(ClientError::ItemErrors {
                    operation: "list tuples",
                    errors: page.errors,
                });
            }

            trace!(
                tuples = page.tuples.len(),
                next = %page.continuation_token,
                "received tuple page"
            );
            tuples.extend(page.tuples);

            if page.continuation_token.is_empty() {
                return Ok(tuples);
            }
            if page.continuation_token == continuation_token {
                return Err(ClientError::RepeatedToken(page.continuation_token));
            }
            continuation_token = page.continuation_token;
        }
    }
}
