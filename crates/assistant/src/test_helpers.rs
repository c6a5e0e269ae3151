//! Scripted providers and a ready-made context for router and hub tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use palaver_config::AppConfig;
use palaver_core::error::ProviderError;
use palaver_core::message::{Message, Role};
use palaver_core::provider::{Provider, ProviderRequest, ProviderResponse};
use palaver_memory::{InMemoryPromptStore, InMemorySnapshotStore};
use tokio::sync::Semaphore;

use crate::context::AssistantContext;
use crate::registry::PromptRegistry;
use crate::settings::{GenerationSettings, ModelCatalog};

fn response(text: impl Into<String>, model: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: None,
        model: model.to_string(),
    }
}

/// Replies from a fixed script, recording every request it receives.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<&str>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().map(String::from).collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let model = request.params.model.clone();
        self.requests.lock().unwrap().push(request);
        match self.replies.lock().unwrap().pop_front() {
            Some(text) => Ok(response(text, &model)),
            None => Err(ProviderError::NotConfigured("script exhausted".into())),
        }
    }
}

/// Every call fails.
pub struct FailingProvider;

#[async_trait]
impl Provider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(ProviderError::Network("connection refused".into()))
    }
}

/// Echoes the last user turn. Turns containing "slow" wait for a permit
/// on `gate` first.
pub struct GatedProvider {
    pub gate: Arc<Semaphore>,
}

impl GatedProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            gate: Arc::new(Semaphore::new(0)),
        })
    }
}

#[async_trait]
impl Provider for GatedProvider {
    fn name(&self) -> &str {
        "gated"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let last = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role() == Role::User)
            .map(Message::text)
            .unwrap_or_default();
        if last.contains("slow") {
            let permit = self
                .gate
                .acquire()
                .await
                .map_err(|_| ProviderError::Network("gate closed".into()))?;
            permit.forget();
        }
        Ok(response(format!("echo: {last}"), &request.params.model))
    }
}

/// A context over in-memory stores and the default model catalog.
pub fn context(provider: Arc<dyn Provider>) -> (AssistantContext, Arc<InMemoryPromptStore>) {
    let store = Arc::new(InMemoryPromptStore::new());
    let registry = PromptRegistry::open(store.clone()).unwrap();
    let config = AppConfig::default();
    let catalog = ModelCatalog::from_config(&config);
    let settings = GenerationSettings::from_config(&config, &catalog).unwrap();
    let ctx = AssistantContext::new(
        provider,
        registry,
        Arc::new(InMemorySnapshotStore::new()),
        catalog,
        settings,
    );
    (ctx, store)
}
