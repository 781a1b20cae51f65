// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for mocking the controller.
//!
//! `MockConnector` hands out sessions against an in-memory controller. The matching
//! `MockControllerHandle` shares its state and lets tests seed tuples and models, script listing
//! pages, inject failures and inspect what the client did.
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use juju_access_core::{
    ModelSummary, ModelType, RelationshipTuple, Subject, Subjects, Tag, TupleFilter,
};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::{ControllerConfig, DialOptions};
use crate::connector::{Connector, Session, TuplePage};

/// Controller operations a failure can be injected into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MockOperation {
    Connect,
    AddTuples,
    RemoveTuples,
    ListTuples,
    ListModels,
    Probe,
}

/// Tuple mutations received by the mock controller, in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MockCall {
    Add(Vec<RelationshipTuple>),
    Remove(Vec<RelationshipTuple>),
}

#[derive(Debug, Error)]
pub enum MockError {
    #[error("injected {0:?} failure")]
    Injected(MockOperation),

    #[error("controller does not offer the relationship API")]
    NotSupported,

    #[error("unknown continuation token {0:?}")]
    UnknownToken(String),
}

#[derive(Debug)]
struct MockState {
    tuples: BTreeSet<RelationshipTuple>,
    models: Vec<ModelSummary>,
    page_size: Option<usize>,
    scripted_pages: Option<Vec<TuplePage>>,
    list_errors: Vec<String>,
    jaas: bool,
    probe_delay: Option<Duration>,
    connect_delay: Option<Duration>,
    failures: HashMap<MockOperation, usize>,
    calls: Vec<MockCall>,
    list_tokens: Vec<String>,
    last_dial_options: Option<DialOptions>,
    connects: usize,
    open_sessions: usize,
    probes: usize,
    model_listings: usize,
}

impl MockState {
    fn new() -> Self {
        Self {
            tuples: BTreeSet::new(),
            models: Vec::new(),
            page_size: None,
            scripted_pages: None,
            list_errors: Vec::new(),
            jaas: true,
            probe_delay: None,
            connect_delay: None,
            failures: HashMap::new(),
            calls: Vec::new(),
            list_tokens: Vec::new(),
            last_dial_options: None,
            connects: 0,
            open_sessions: 0,
            probes: 0,
            model_listings: 0,
        }
    }

    fn take_failure(&mut self, operation: MockOperation) -> Result<(), MockError> {
        match self.failures.get_mut(&operation) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(MockError::Injected(operation))
            }
            _ => Ok(()),
        }
    }

    fn scripted_page(&self, continuation_token: &str) -> Option<Result<TuplePage, MockError>> {
        let pages = self.scripted_pages.as_ref()?;

        let index = if continuation_token.is_empty() {
            0
        } else {
            match pages
                .iter()
                .position(|page| page.continuation_token == continuation_token)
            {
                Some(index) => index + 1,
                None => return Some(Err(MockError::UnknownToken(continuation_token.into()))),
            }
        };

        Some(
            pages
                .get(index)
                .cloned()
                .ok_or_else(|| MockError::UnknownToken(continuation_token.into())),
        )
    }

    fn stored_page(
        &self,
        filter: &TupleFilter,
        continuation_token: &str,
    ) -> Result<TuplePage, MockError> {
        let offset = if continuation_token.is_empty() {
            0
        } else {
            continuation_token
                .parse::<usize>()
                .map_err(|_| MockError::UnknownToken(continuation_token.into()))?
        };

        let matching: Vec<RelationshipTuple> = self
            .tuples
            .iter()
            .filter(|tuple| filter.matches(tuple))
            .cloned()
            .collect();
        let page_size = self.page_size.unwrap_or(matching.len().max(1));
        let end = (offset + page_size).min(matching.len());

        let continuation_token = if end < matching.len() {
            end.to_string()
        } else {
            String::new()
        };

        Ok(TuplePage {
            tuples: matching.get(offset..end).unwrap_or_default().to_vec(),
            continuation_token,
            errors: Vec::new(),
        })
    }
}

/// Connector to the in-memory controller.
#[derive(Clone, Debug)]
pub struct MockConnector {
    state: Arc<Mutex<MockState>>,
}

impl MockConnector {
    pub fn new() -> (Self, MockControllerHandle) {
        let state = Arc::new(Mutex::new(MockState::new()));
        (
            Self {
                state: state.clone(),
            },
            MockControllerHandle { state },
        )
    }
}

impl Connector for MockConnector {
    type Error = MockError;

    type Session = MockSession;

    async fn connect(
        &self,
        config: &ControllerConfig,
        model_uuid: Option<&str>,
        options: &DialOptions,
    ) -> Result<Self::Session, Self::Error> {
        let delay = {
            let mut state = self.state.lock().await;
            state.connects += 1;
            state.last_dial_options = Some(options.clone());
            state.take_failure(MockOperation::Connect)?;
            state.connect_delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let auth_user = if config.username.is_empty() {
            config.client_id.clone()
        } else {
            config.username.clone()
        };

        self.state.lock().await.open_sessions += 1;

        Ok(MockSession {
            state: self.state.clone(),
            auth_user,
            model_uuid: model_uuid.map(str::to_string),
        })
    }
}

#[derive(Debug)]
pub struct MockSession {
    state: Arc<Mutex<MockState>>,
    auth_user: String,
    model_uuid: Option<String>,
}

impl MockSession {
    /// UUID of the model this session was opened against.
    pub fn model_uuid(&self) -> Option<&str> {
        self.model_uuid.as_deref()
    }
}

impl Session for MockSession {
    type Error = MockError;

    fn auth_user(&self) -> &str {
        &self.auth_user
    }

    async fn add_tuples(&self, tuples: &[RelationshipTuple]) -> Result<(), Self::Error> {
        let mut state = self.state.lock().await;
        state.take_failure(MockOperation::AddTuples)?;
        state.calls.push(MockCall::Add(tuples.to_vec()));
        state.tuples.extend(tuples.iter().cloned());
        Ok(())
    }

    async fn remove_tuples(&self, tuples: &[RelationshipTuple]) -> Result<(), Self::Error> {
        let mut state = self.state.lock().await;
        state.take_failure(MockOperation::RemoveTuples)?;
        state.calls.push(MockCall::Remove(tuples.to_vec()));
        for tuple in tuples {
            state.tuples.remove(tuple);
        }
        Ok(())
    }

    async fn list_tuples(
        &self,
        filter: &TupleFilter,
        continuation_token: &str,
    ) -> Result<TuplePage, Self::Error> {
        let mut state = self.state.lock().await;
        state.take_failure(MockOperation::ListTuples)?;
        state.list_tokens.push(continuation_token.to_string());

        let mut page = match state.scripted_page(continuation_token) {
            Some(page) => page?,
            None => state.stored_page(filter, continuation_token)?,
        };

        if continuation_token.is_empty() {
            page.errors.append(&mut state.list_errors);
        }

        Ok(page)
    }

    async fn list_model_summaries(&self, _user: &str) -> Result<Vec<ModelSummary>, Self::Error> {
        let mut state = self.state.lock().await;
        state.take_failure(MockOperation::ListModels)?;
        state.model_listings += 1;
        Ok(state.models.clone())
    }

    async fn probe_capability(&self) -> Result<(), Self::Error> {
        let (delay, jaas) = {
            let mut state = self.state.lock().await;
            state.take_failure(MockOperation::Probe)?;
            state.probes += 1;
            (state.probe_delay, state.jaas)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if jaas {
            Ok(())
        } else {
            Err(MockError::NotSupported)
        }
    }

    async fn close(&self) {
        let mut state = self.state.lock().await;
        state.open_sessions -= 1;
    }
}

/// Test-side view on the mock controller.
#[derive(Clone, Debug)]
pub struct MockControllerHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockControllerHandle {
    pub async fn insert_tuples(&self, tuples: impl IntoIterator<Item = RelationshipTuple>) {
        self.state.lock().await.tuples.extend(tuples);
    }

    pub async fn insert_models(&self, models: impl IntoIterator<Item = ModelSummary>) {
        self.state.lock().await.models.extend(models);
    }

    /// Serve these pages instead of the stored tuples. Each page is requested with the
    /// continuation token of the page before it.
    pub async fn script_pages(&self, pages: Vec<TuplePage>) {
        self.state.lock().await.scripted_pages = Some(pages);
    }

    pub async fn set_page_size(&self, page_size: usize) {
        self.state.lock().await.page_size = Some(page_size);
    }

    /// Report these item errors on the next first page.
    pub async fn report_item_errors(&self, errors: Vec<String>) {
        self.state.lock().await.list_errors = errors;
    }

    pub async fn set_jaas(&self, jaas: bool) {
        self.state.lock().await.jaas = jaas;
    }

    pub async fn set_probe_delay(&self, delay: Duration) {
        self.state.lock().await.probe_delay = Some(delay);
    }

    pub async fn set_connect_delay(&self, delay: Duration) {
        self.state.lock().await.connect_delay = Some(delay);
    }

    /// Fail the next `times` calls of `operation`.
    pub async fn fail_next(&self, operation: MockOperation, times: usize) {
        self.state.lock().await.failures.insert(operation, times);
    }

    pub async fn tuples(&self) -> BTreeSet<RelationshipTuple> {
        self.state.lock().await.tuples.clone()
    }

    /// Subjects currently holding `relation` on `target`.
    pub async fn subjects(&self, target: &Tag, relation: &str) -> Result<Subjects> {
        let target = target.to_string();
        let state = self.state.lock().await;

        state
            .tuples
            .iter()
            .filter(|tuple| tuple.target_object == target && tuple.relation == relation)
            .map(|tuple| {
                Subject::from_object(&tuple.object)
                    .with_context(|| format!("stored tuple {tuple} has no subject object"))
            })
            .collect()
    }

    pub async fn calls(&self) -> Vec<MockCall> {
        self.state.lock().await.calls.clone()
    }

    pub async fn list_tokens(&self) -> Vec<String> {
        self.state.lock().await.list_tokens.clone()
    }

    pub async fn last_dial_options(&self) -> Option<DialOptions> {
        self.state.lock().await.last_dial_options.clone()
    }

    pub async fn connects(&self) -> usize {
        self.state.lock().await.connects
    }

    pub async fn open_sessions(&self) -> usize {
        self.state.lock().await.open_sessions
    }

    pub async fn probes(&self) -> usize {
        self.state.lock().await.probes
    }

    pub async fn model_listings(&self) -> usize {
        self.state.lock().await.model_listings
    }
}

/// Configuration for a plain controller with password login.
pub fn controller_config() -> ControllerConfig {
    ControllerConfig {
        controller_addresses: vec!["10.0.0.1:17070".into()],
        username: "admin".into(),
        password: "secret".into(),
        ..Default::default()
    }
}

/// Configuration with client credentials, as issued for JAAS.
pub fn jaas_config() -> ControllerConfig {
    ControllerConfig {
        controller_addresses: vec!["jaas.example.com:443".into()],
        client_id: "terraform".into(),
        client_secret: "hunter2".into(),
        ..Default::default()
    }
}

pub fn model_summary(name: &str, uuid: &str) -> ModelSummary {
    ModelSummary {
        name: name.to_string(),
        uuid: uuid.to_string(),
        owner_tag: "user-admin".to_string(),
        model_type: ModelType::Iaas,
    }
}

pub fn setup_logging() {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}
