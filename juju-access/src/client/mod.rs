// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client for a single controller.
//!
//! `Client` owns the [`Shared`] services (connector, configuration, model cache and capability
//! gate) and hands them to each component it builds. Cloning a client is cheap and all clones share
//! the same cache and capability result.
mod shared;
mod tuples;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use crate::capability::{CapabilityValidator, Diagnostic};
use crate::config::{ConfigError, ControllerConfig};
use crate::connector::{Connector, SessionError};

pub use shared::Shared;
pub use tuples::TupleClient;

#[derive(Debug)]
pub struct Client<C>
where
    C: Connector,
{
    shared: Arc<Shared<C>>,
    tuples: TupleClient<C>,
}

impl<C> Clone for Client<C>
where
    C: Connector,
{
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            tuples: self.tuples.clone(),
        }
    }
}

impl<C> Client<C>
where
    C: Connector,
{
    pub fn new(connector: C, config: ControllerConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let shared = Arc::new(Shared::new(connector, config));
        Ok(Self {
            tuples: TupleClient::new(shared.clone()),
            shared,
        })
    }

    pub fn shared(&self) -> &Shared<C> {
        &self.shared
    }

    pub fn tuples(&self) -> &TupleClient<C> {
        &self.tuples
    }

    /// Whether the configured controller is a JAAS controller. Probed once per client.
    pub async fn is_jaas(&self) -> bool {
        self.shared.is_jaas().await
    }

    /// Run a capability validator against this client's controller.
    pub async fn validate<V>(&self, validator: &V) -> Option<Diagnostic>
    where
        V: CapabilityValidator,
    {
        let diagnostic = validator.validate(self.is_jaas().await)?;
        if !diagnostic.is_error() {
            warn!(summary = %diagnostic.summary, "{}", diagnostic.detail);
        }
        Some(diagnostic)
    }
}

#[derive(Debug, Error)]
pub enum ClientError<C>
where
    C: Connector,
{
    #[error("connection not established: {0}")]
    Connection(#[source] C::Error),

    #[error("connection not established within {0:?}")]
    ConnectTimeout(Duration),

    #[error("{operation} failed: {source}")]
    Remote {
        operation: &'static str,
        #[source]
        source: SessionError<C>,
    },

    #[error("{operation} reported errors: {}", .errors.join("; "))]
    ItemErrors {
        operation: &'static str,
        errors: Vec<String>,
    },

    #[error("controller repeated continuation token {0:?}")]
    RepeatedToken(String),

    #[error("model {0:?} not found")]
    ModelNotFound(String),
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use juju_access_core::{ModelType, RelationshipTuple, TupleFilter};

    use crate::capability::{AvoidJaas, RequiresJaas, Severity};
    use crate::connector::TuplePage;
    use crate::test_utils::{
        MockConnector, MockOperation, controller_config, jaas_config, model_summary, setup_logging,
    };

    use super::{Client, ClientError};

    fn tuple(object: &str) -> RelationshipTuple {
        RelationshipTuple::new(object, "reader", "model-1234")
    }

    #[tokio::test]
    async fn reads_every_page_before_returning() {
        setup_logging();
        let (connector, handle) = MockConnector::new();
        handle
            .script_pages(vec![
                TuplePage {
                    tuples: vec![tuple("user-a"), tuple("user-b")],
                    continuation_token: "a".into(),
                    errors: vec![],
                },
                TuplePage {
                    tuples: vec![tuple("user-c"), tuple("user-d")],
                    continuation_token: "b".into(),
                    errors: vec![],
                },
                TuplePage {
                    tuples: vec![tuple("user-e")],
                    continuation_token: "".into(),
                    errors: vec![],
                },
            ])
            .await;
        let client = Client::new(connector, jaas_config()).unwrap();

        let tuples = client
            .tuples()
            .read_tuples(&TupleFilter::relation_on("model-1234", "reader"))
            .await
            .unwrap();

        assert_eq!(tuples.len(), 5);
        assert_eq!(
            handle.list_tokens().await,
            vec!["".to_string(), "a".to_string(), "b".to_string()]
        );
        assert_eq!(handle.open_sessions().await, 0);
    }

    #[tokio::test]
    async fn paginates_stored_tuples() {
        let (connector, handle) = MockConnector::new();
        handle.set_page_size(2).await;
        handle
            .insert_tuples((0..7).map(|i| tuple(&format!("user-{i}"))))
            .await;
        let client = Client::new(connector, jaas_config()).unwrap();

        let tuples = client
            .tuples()
            .read_tuples(&TupleFilter::relation_on("model-1234", "reader"))
            .await
            .unwrap();

        assert_eq!(tuples.len(), 7);
        assert_eq!(handle.list_tokens().await.len(), 4);
    }

    #[tokio::test]
    async fn item_errors_fail_the_listing() {
        let (connector, handle) = MockConnector::new();
        handle.insert_tuples([tuple("user-a")]).await;
        handle.report_item_errors(vec!["tuple 3 is broken".into()]).await;
        let client = Client::new(connector, jaas_config()).unwrap();

        let result = client
            .tuples()
            .read_tuples(&TupleFilter::relation_on("model-1234", "reader"))
            .await;

        assert!(matches!(result, Err(ClientError::ItemErrors { .. })));
        assert_eq!(handle.open_sessions().await, 0);
    }

    #[tokio::test]
    async fn repeated_token_stops_listing() {
        let (connector, handle) = MockConnector::new();
        handle
            .script_pages(vec![
                TuplePage {
                    tuples: vec![tuple("user-a")],
                    continuation_token: "a".into(),
                    errors: vec![],
                },
                TuplePage {
                    tuples: vec![tuple("user-b")],
                    continuation_token: "a".into(),
                    errors: vec![],
                },
            ])
            .await;
        let client = Client::new(connector, jaas_config()).unwrap();

        let result = client.tuples().read_tuples(&TupleFilter::default()).await;
        assert!(matches!(result, Err(ClientError::RepeatedToken(token)) if token == "a"));
    }

    #[tokio::test]
    async fn sessions_are_released_on_failure() {
        let (connector, handle) = MockConnector::new();
        handle.fail_next(MockOperation::AddTuples, 1).await;
        handle.fail_next(MockOperation::RemoveTuples, 1).await;
        let client = Client::new(connector, jaas_config()).unwrap();

        assert!(client.tuples().add_tuples(&[tuple("user-a")]).await.is_err());
        assert!(client.tuples().remove_tuples(&[tuple("user-a")]).await.is_err());
        assert_eq!(handle.open_sessions().await, 0);
        assert_eq!(handle.connects().await, 2);
    }

    #[tokio::test]
    async fn connection_errors_are_not_retried() {
        let (connector, handle) = MockConnector::new();
        handle.fail_next(MockOperation::Connect, 1).await;
        let client = Client::new(connector, jaas_config()).unwrap();

        let result = client.tuples().add_tuples(&[tuple("user-a")]).await;
        assert!(matches!(result, Err(ClientError::Connection(_))));
        assert_eq!(handle.connects().await, 1);
        assert!(handle.calls().await.is_empty());
    }

    #[tokio::test]
    async fn connect_uses_configured_dial_options() {
        let (connector, handle) = MockConnector::new();
        let mut config = jaas_config();
        config.dial_options.timeout = Duration::from_secs(5);
        let client = Client::new(connector, config).unwrap();

        client.tuples().add_tuples(&[tuple("user-a")]).await.unwrap();

        let options = handle.last_dial_options().await.unwrap();
        assert_eq!(options.timeout, Duration::from_secs(5));
        assert_eq!(options.retry_delay, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn model_uuid_refills_once_on_miss() {
        let (connector, handle) = MockConnector::new();
        handle
            .insert_models([model_summary("prod", "2f0b4a56-1c1f-4c76-8fd4-7c5a01b2a7e3")])
            .await;
        let client = Client::new(connector, controller_config()).unwrap();

        let uuid = client.shared().model_uuid("prod").await.unwrap();
        assert_eq!(uuid, "2f0b4a56-1c1f-4c76-8fd4-7c5a01b2a7e3");
        assert_eq!(handle.model_listings().await, 1);

        // Served from the cache.
        client.shared().model_uuid("prod").await.unwrap();
        assert_eq!(handle.model_listings().await, 1);

        // Second miss refills once, then gives up.
        let result = client.shared().model_uuid("staging").await;
        assert!(matches!(result, Err(ClientError::ModelNotFound(name)) if name == "staging"));
        assert_eq!(handle.model_listings().await, 2);
        assert_eq!(handle.open_sessions().await, 0);
    }

    #[tokio::test]
    async fn model_type_only_reads_the_cache() {
        let (connector, handle) = MockConnector::new();
        handle
            .insert_models([model_summary("prod", "2f0b4a56-1c1f-4c76-8fd4-7c5a01b2a7e3")])
            .await;
        let client = Client::new(connector, controller_config()).unwrap();

        assert!(client.shared().model_type("prod").await.is_err());

        client
            .shared()
            .add_model("k8s", "admin", "7d2e0c1a-5f44-4b3b-9a57-0e9f5e2d1c3b", ModelType::Caas)
            .await;
        assert_eq!(
            client.shared().model_type("k8s").await.unwrap(),
            ModelType::Caas
        );
        assert_eq!(handle.model_listings().await, 0);

        client
            .shared()
            .remove_model("7d2e0c1a-5f44-4b3b-9a57-0e9f5e2d1c3b")
            .await;
        assert!(client.shared().model_type("k8s").await.is_err());
    }

    #[tokio::test]
    async fn model_scoped_sessions_resolve_the_uuid() {
        let (connector, handle) = MockConnector::new();
        handle
            .insert_models([model_summary("prod", "2f0b4a56-1c1f-4c76-8fd4-7c5a01b2a7e3")])
            .await;
        let client = Client::new(connector, controller_config()).unwrap();

        let session = client.shared().connect(Some("prod")).await.unwrap();
        assert_eq!(
            session.model_uuid(),
            Some("2f0b4a56-1c1f-4c76-8fd4-7c5a01b2a7e3")
        );
        session.close().await;
        assert_eq!(handle.open_sessions().await, 0);
        assert_eq!(handle.model_listings().await, 1);
    }

    #[tokio::test]
    async fn abandoned_calls_release_their_session() {
        let (connector, handle) = MockConnector::new();
        handle.set_probe_delay(Duration::from_millis(200)).await;
        let client = Client::new(connector, controller_config()).unwrap();

        let result = tokio::time::timeout(Duration::from_millis(20), client.is_jaas()).await;
        assert!(result.is_err());

        // Teardown of the dropped session runs on a background task.
        for _ in 0..20 {
            if handle.open_sessions().await == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(handle.open_sessions().await, 0);
        assert_eq!(handle.connects().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn capability_is_probed_once() {
        let (connector, handle) = MockConnector::new();
        handle.set_jaas(true).await;
        handle.set_probe_delay(Duration::from_millis(20)).await;
        let client = Client::new(connector, controller_config()).unwrap();

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let client = client.clone();
            tasks.push(tokio::spawn(async move { client.is_jaas().await }));
        }
        for task in tasks {
            assert!(task.await.unwrap());
        }

        // The controller changing its mind later is not observed.
        handle.set_jaas(false).await;
        assert!(client.is_jaas().await);
        assert_eq!(handle.probes().await, 1);
        assert_eq!(handle.open_sessions().await, 0);
    }

    #[tokio::test]
    async fn capability_falls_back_to_credential_hint() {
        let (connector, handle) = MockConnector::new();
        handle.fail_next(MockOperation::Connect, 1).await;
        let client = Client::new(connector, jaas_config()).unwrap();
        assert!(client.is_jaas().await);
        assert_eq!(handle.probes().await, 0);

        let (connector, handle) = MockConnector::new();
        handle.fail_next(MockOperation::Connect, 1).await;
        let client = Client::new(connector, controller_config()).unwrap();
        assert!(!client.is_jaas().await);
    }

    #[tokio::test]
    async fn validators_follow_the_capability() {
        let (connector, handle) = MockConnector::new();
        handle.set_jaas(true).await;
        let client = Client::new(connector, controller_config()).unwrap();

        assert!(client.validate(&RequiresJaas).await.is_none());
        let warning = client.validate(&AvoidJaas).await.unwrap();
        assert_eq!(warning.severity, Severity::Warning);
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let (connector, _handle) = MockConnector::new();
        let mut config = controller_config();
        config.controller_addresses.clear();
        assert!(Client::new(connector, config).is_err());
    }
}
