// SPDX-License-Identifier: MIT OR Apache-2.0

//! Interface to the controller transport.
//!
//! The transport itself (dialing, login, framing) is owned by the implementer. This crate only
//! needs a factory for authenticated sessions and the handful of calls a session offers.
use std::error::Error;
use std::fmt::Debug;
use std::future::Future;
use std::ops::Deref;
use std::sync::Arc;

use juju_access_core::{ModelSummary, RelationshipTuple, TupleFilter};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{ControllerConfig, DialOptions};

/// Factory for authenticated controller sessions.
pub trait Connector: Debug + Send + Sync + 'static {
    type Error: Error + Send + Sync + 'static;

    type Session: Session;

    /// Open a session against the controller, or against one of its models when a model UUID
    /// is given.
    fn connect(
        &self,
        config: &ControllerConfig,
        model_uuid: Option<&str>,
        options: &DialOptions,
    ) -> impl Future<Output = Result<Self::Session, Self::Error>> + Send;
}

/// One authenticated connection to the controller.
///
/// Sessions are short-lived: every call site opens one, issues its requests and closes it again
/// on every exit path.
pub trait Session: Send + Sync + 'static {
    type Error: Error + Send + Sync + 'static;

    /// Identifier of the user this session is authenticated as.
    fn auth_user(&self) -> &str;

    /// Add tuples. Adding a tuple which already exists is a no-op.
    fn add_tuples(
        &self,
        tuples: &[RelationshipTuple],
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Remove tuples. Removing a tuple which does not exist is a no-op.
    fn remove_tuples(
        &self,
        tuples: &[RelationshipTuple],
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// List one page of tuples matching the filter, starting at the continuation token. An empty
    /// token requests the first page.
    fn list_tuples(
        &self,
        filter: &TupleFilter,
        continuation_token: &str,
    ) -> impl Future<Output = Result<TuplePage, Self::Error>> + Send;

    /// List summaries of all models visible to the given user.
    fn list_model_summaries(
        &self,
        user: &str,
    ) -> impl Future<Output = Result<Vec<ModelSummary>, Self::Error>> + Send;

    /// Issue a call only JAAS controllers understand.
    fn probe_capability(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Release the session. Called exactly once, no other call follows it.
    fn close(&self) -> impl Future<Output = ()> + Send;
}

/// One page of a tuple listing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TuplePage {
    pub tuples: Vec<RelationshipTuple>,

    /// Token to request the next page with, empty on the last page.
    pub continuation_token: String,

    /// Errors the controller reported for individual items of this page.
    pub errors: Vec<String>,
}

/// Open session which is closed when the guard goes out of scope.
///
/// Call sites close it explicitly with [`SessionGuard::close`] so teardown completes before they
/// return. If the surrounding future is dropped first, the guard closes the session on a
/// background task of the current runtime.
#[derive(Debug)]
pub struct SessionGuard<S>
where
    S: Session,
{
    session: Arc<S>,
    closed: bool,
}

impl<S> SessionGuard<S>
where
    S: Session,
{
    pub fn new(session: S) -> Self {
        Self {
            session: Arc::new(session),
            closed: false,
        }
    }

    pub async fn close(mut self) {
        self.closed = true;
        self.session.close().await;
    }
}

impl<S> Deref for SessionGuard<S>
where
    S: Session,
{
    type Target = S;

    fn deref(&self) -> &Self::Target {
        &self.session
    }
}

impl<S> Drop for SessionGuard<S>
where
    S: Session,
{
    fn drop(&mut self) {
        if self.closed {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!("session abandoned, closing in background");
                let session = self.session.clone();
                handle.spawn(async move { session.close().await });
            }
            Err(_) => debug!("session abandoned outside of a runtime"),
        }
    }
}

pub(crate) type SessionError<C> = <<C as Connector>::Session as Session>::Error;
