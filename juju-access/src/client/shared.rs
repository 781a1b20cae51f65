// SPDX-License-Identifier: MIT OR Apache-2.0

use juju_access_core::{ModelIdentity, ModelType};
use tracing::{debug, error, trace};

use crate::cache::ModelCache;
use crate::capability::CapabilityGate;
use crate::client::ClientError;
use crate::config::ControllerConfig;
use crate::connector::{Connector, Session, SessionGuard};

/// Services shared by every component of one client: the connector and its configuration, the
/// model identity cache and the capability gate.
///
/// Components receive it behind an `Arc` when they are constructed.
#[derive(Debug)]
pub struct Shared<C>
where
    C: Connector,
{
    connector: C,
    config: ControllerConfig,
    models: ModelCache,
    capability: CapabilityGate,
}

impl<C> Shared<C>
where
    C: Connector,
{
    pub(crate) fn new(connector: C, config: ControllerConfig) -> Self {
        Self {
            connector,
            config,
            models: ModelCache::new(),
            capability: CapabilityGate::new(),
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn models(&self) -> &ModelCache {
        &self.models
    }

    /// Open a session, scoped to the named model if one is given.
    ///
    /// Every connect uses the configured dial options and is bounded by their timeout. Failures
    /// are returned to the caller and never retried here.
    pub async fn connect(
        &self,
        model_name: Option<&str>,
    ) -> Result<SessionGuard<C::Session>, ClientError<C>> {
        match model_name {
            Some(name) => {
                let uuid = self.model_uuid(name).await?;
                self.dial(Some(&uuid)).await
            }
            None => self.dial(None).await,
        }
    }

    /// Open a session against the controller or a model UUID which is already known.
    pub(crate) async fn dial(
        &self,
        model_uuid: Option<&str>,
    ) -> Result<SessionGuard<C::Session>, ClientError<C>> {
        let options = &self.config.dial_options;
        let connect = self.connector.connect(&self.config, model_uuid, options);

        match tokio::time::timeout(options.timeout, connect).await {
            Ok(Ok(session)) => {
                trace!(?model_uuid, "session established");
                Ok(SessionGuard::new(session))
            }
            Ok(Err(err)) => {
                error!(%err, "connection not established");
                Err(ClientError::Connection(err))
            }
            Err(_) => {
                error!(timeout = ?options.timeout, "connection not established in time");
                Err(ClientError::ConnectTimeout(options.timeout))
            }
        }
    }

    /// Resolve a model name to its UUID.
    ///
    /// A cache miss triggers exactly one refill from the controller followed by one more lookup.
    pub async fn model_uuid(&self, name: &str) -> Result<String, ClientError<C>> {
        if let Some(model) = self.models.lookup(name).await {
            return Ok(model.uuid);
        }

        self.fill_model_cache().await?;

        match self.models.lookup(name).await {
            Some(model) => Ok(model.uuid),
            None => Err(ClientError::ModelNotFound(name.to_string())),
        }
    }

    /// Model type of a cached model. Never contacts the controller.
    pub async fn model_type(&self, name: &str) -> Result<ModelType, ClientError<C>> {
        self.models
            .lookup(name)
            .await
            .map(|model| model.model_type)
            .ok_or_else(|| ClientError::ModelNotFound(name.to_string()))
    }

    /// Record a model created through this client, saving a refill round trip.
    pub async fn add_model(
        &self,
        name: &str,
        owner: &str,
        uuid: &str,
        model_type: ModelType,
    ) {
        self.models
            .add_model(ModelIdentity::new(name, owner, uuid, model_type))
            .await;
    }

    /// Forget a model destroyed through this client.
    pub async fn remove_model(&self, uuid: &str) {
        self.models.remove_model(uuid).await;
    }

    /// Replace the model cache with the models visible to the authenticated user.
    pub async fn fill_model_cache(&self) -> Result<(), ClientError<C>> {
        let session = self.dial(None).await?;
        let user = session.auth_user().to_string();
        let result = session.list_model_summaries(&user).await;
        session.close().await;

        let summaries = result.map_err(|source| ClientError::Remote {
            operation: "list model summaries",
            source,
        })?;

        debug!(models = summaries.len(), %user, "refilling model cache");
        self.models.fill(summaries).await;
        Ok(())
    }

    /// Whether the controller is a JAAS controller.
    ///
    /// Probed once per client. If the probe can not be made the credential format decides.
    pub async fn is_jaas(&self) -> bool {
        let default = self.config.capability_hint();
        self.capability
            .is_capable(default, || async {
                let session = self.dial(None).await?;
                let result = session.probe_capability().await;
                session.close().await;
                result.map_err(|source| ClientError::Remote {
                    operation: "probe capability",
                    source,
                })
            })
            .await
    }
}
