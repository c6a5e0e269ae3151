//! Collaborators shared by every conversation.

use std::sync::Arc;

use palaver_config::AppConfig;
use palaver_core::error::AssistantError;
use palaver_core::provider::Provider;
use palaver_core::store::SnapshotStore;
use palaver_memory::{FileSnapshotStore, PromptFile};
use palaver_workflow::ReminderScheduler;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::registry::{EMPTY_PROMPT, PromptRegistry};
use crate::settings::{GenerationSettings, ModelCatalog};

/// Everything a [`CommandRouter`](crate::CommandRouter) needs besides its
/// own conversation state. Cheap to clone.
#[derive(Clone)]
pub struct AssistantContext {
    pub provider: Arc<dyn Provider>,

    /// Single writer for the prompt registry across all conversations
    pub registry: Arc<Mutex<PromptRegistry>>,

    pub snapshots: Arc<dyn SnapshotStore>,
    pub catalog: Arc<ModelCatalog>,

    /// Present only when reminders are enabled
    pub reminders: Option<Arc<ReminderScheduler>>,

    pub prefix: String,
    pub hotswap: [String; 2],

    /// Settings each new conversation starts from
    pub default_settings: GenerationSettings,

    /// Prompt each new conversation starts on
    pub initial_prompt: String,
}

impl AssistantContext {
    pub fn new(
        provider: Arc<dyn Provider>,
        registry: PromptRegistry,
        snapshots: Arc<dyn SnapshotStore>,
        catalog: ModelCatalog,
        default_settings: GenerationSettings,
    ) -> Self {
        Self {
            provider,
            registry: Arc::new(Mutex::new(registry)),
            snapshots,
            catalog: Arc::new(catalog),
            reminders: None,
            prefix: "!".into(),
            hotswap: ["gpt-4-0125-preview".into(), "gpt-4-vision-preview".into()],
            default_settings,
            initial_prompt: EMPTY_PROMPT.into(),
        }
    }

    /// Build from configuration: prompt record file and snapshot directory
    /// under `data_dir`.
    pub fn from_config(config: &AppConfig, provider: Arc<dyn Provider>) -> Result<Self, AssistantError> {
        let registry = PromptRegistry::open(Arc::new(PromptFile::new(config.prompts_file())))?;
        let snapshots = Arc::new(FileSnapshotStore::new(config.threads_dir()));
        let catalog = ModelCatalog::from_config(config);
        let settings = GenerationSettings::from_config(config, &catalog)?;

        let initial_prompt = if registry.contains(&config.initial_prompt) {
            config.initial_prompt.clone()
        } else {
            warn!(prompt = %config.initial_prompt, "Initial prompt not in registry, using '{EMPTY_PROMPT}'");
            EMPTY_PROMPT.to_string()
        };

        info!(
            prompts = registry.len(),
            model = %settings.model(),
            initial_prompt = %initial_prompt,
            "Assistant context ready"
        );

        Ok(Self::new(provider, registry, snapshots, catalog, settings)
            .with_prefix(config.command_prefix.clone())
            .with_hotswap(config.hotswap_models.clone())
            .with_initial_prompt(initial_prompt))
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_hotswap(mut self, pair: [String; 2]) -> Self {
        self.hotswap = pair;
        self
    }

    pub fn with_initial_prompt(mut self, name: impl Into<String>) -> Self {
        self.initial_prompt = name.into();
        self
    }

    pub fn with_reminders(mut self, scheduler: Arc<ReminderScheduler>) -> Self {
        self.reminders = Some(scheduler);
        self
    }

    pub fn reminders_enabled(&self) -> bool {
        self.reminders.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ScriptedProvider;

    #[tokio::test]
    async fn from_config_uses_data_dir_and_falls_back_to_empty_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            data_dir: dir.path().to_path_buf(),
            initial_prompt: "missing".into(),
            command_prefix: "?".into(),
            ..AppConfig::default()
        };

        let ctx = AssistantContext::from_config(&config, ScriptedProvider::new(vec![])).unwrap();
        assert_eq!(ctx.initial_prompt, EMPTY_PROMPT);
        assert_eq!(ctx.prefix, "?");
        assert!(!ctx.reminders_enabled());
        assert!(config.prompts_file().exists());
        assert!(ctx.registry.lock().await.contains(EMPTY_PROMPT));
    }
}
