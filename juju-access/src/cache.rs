// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-local cache of model identities.
//!
//! The cache is pure storage: a miss is reported as `None` and it is up to the caller to refill
//! it from the controller and retry. A refill replaces the whole table in one step, so readers
//! observe either the previous snapshot or the new one and never a mix of both. Explicit adds and
//! removes patch the last snapshot in place.
use std::collections::HashMap;

use juju_access_core::{ModelIdentity, ModelSummary};
use tokio::sync::RwLock;
use tracing::{debug, trace};

#[derive(Debug, Default)]
pub struct ModelCache {
    models: RwLock<HashMap<String, ModelIdentity>>,
}

impl ModelCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a model by name.
    pub async fn lookup(&self, name: &str) -> Option<ModelIdentity> {
        let models = self.models.read().await;
        models.get(name).cloned()
    }

    /// Replace the cache contents with one record per summary.
    pub async fn fill(&self, summaries: Vec<ModelSummary>) {
        let mut next = HashMap::with_capacity(summaries.len());
        for summary in summaries {
            let identity = ModelIdentity::from(summary);
            if let Some(previous) = next.insert(identity.name.clone(), identity) {
                debug!(
                    name = %previous.name,
                    uuid = %previous.uuid,
                    "duplicate model name in snapshot, keeping the last one"
                );
            }
        }

        let len = next.len();
        *self.models.write().await = next;
        trace!(models = len, "model cache filled");
    }

    /// Insert or replace a model which is already known to the caller.
    ///
    /// A record holding the same UUID under another name is dropped first.
    pub async fn add_model(&self, identity: ModelIdentity) {
        let mut models = self.models.write().await;
        models.retain(|name, existing| existing.uuid != identity.uuid || *name == identity.name);
        models.insert(identity.name.clone(), identity);
    }

    /// Remove a model by UUID. Returns `true` if a record was removed.
    pub async fn remove_model(&self, uuid: &str) -> bool {
        let mut models = self.models.write().await;
        let len = models.len();
        models.retain(|_, existing| existing.uuid != uuid);
        models.len() != len
    }

    /// All cached records, read under one lock.
    pub async fn snapshot(&self) -> Vec<ModelIdentity> {
        let models = self.models.read().await;
        models.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.models.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.models.read().await.is_empty()
    }
}
