//! Configuration loading, validation, and management for Palaver.
//!
//! Loads configuration from `~/.palaver/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.palaver/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default generation provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Marker that turns an utterance into a command
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,

    /// Prompt every new conversation starts on
    #[serde(default = "default_initial_prompt")]
    pub initial_prompt: String,

    /// Where prompts and saved threads live
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Seconds a daemon conversation may sit idle before it is dropped.
    /// 0 keeps conversations for the life of the process.
    #[serde(default = "default_conversation_idle_secs")]
    pub conversation_idle_secs: u64,

    /// Sampling defaults for new conversations
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Known models and their limits
    #[serde(default = "default_models")]
    pub models: Vec<ModelConfig>,

    /// The two models `swap` toggles between
    #[serde(default = "default_hotswap_models")]
    pub hotswap_models: [String; 2],

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Channel configurations
    #[serde(default)]
    pub channels_config: HashMap<String, ChannelConfig>,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_command_prefix() -> String {
    "!".into()
}
fn default_initial_prompt() -> String {
    "empty".into()
}
fn default_conversation_idle_secs() -> u64 {
    3600
}
fn default_data_dir() -> PathBuf {
    AppConfig::config_dir().join("data")
}
fn default_hotswap_models() -> [String; 2] {
    ["gpt-4-0125-preview".into(), "gpt-4-vision-preview".into()]
}

fn default_models() -> Vec<ModelConfig> {
    let model = |name: &str, max_output_tokens, context_length, cutoff: &str, vision| ModelConfig {
        name: name.into(),
        max_output_tokens,
        context_length,
        knowledge_cutoff: cutoff.into(),
        vision,
    };
    vec![
        model("gpt-4o", 4096, 128_000, "Oct 2023", true),
        model("gpt-4-turbo", 4096, 128_000, "Dec 2023", true),
        model("gpt-4-0125-preview", 4096, 128_000, "Dec 2023", false),
        model("gpt-4-1106-preview", 4096, 128_000, "Apr 2023", false),
        model("gpt-4-vision-preview", 4096, 128_000, "Apr 2023", true),
        model("gpt-4", 8192, 8192, "Sep 2021", false),
    ]
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("command_prefix", &self.command_prefix)
            .field("initial_prompt", &self.initial_prompt)
            .field("data_dir", &self.data_dir)
            .field("conversation_idle_secs", &self.conversation_idle_secs)
            .field("generation", &self.generation)
            .field("models", &self.models)
            .field("hotswap_models", &self.hotswap_models)
            .field("providers", &self.providers)
            .field("channels_config", &self.channels_config)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// Sampling defaults. The model's output and context limits come from the
/// catalog entry, not from here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default)]
    pub temperature: f32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    #[serde(default)]
    pub frequency_penalty: f32,

    #[serde(default)]
    pub presence_penalty: f32,
}

fn default_model() -> String {
    "gpt-4o".into()
}
fn default_top_p() -> f32 {
    1.0
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: 0.0,
            top_p: default_top_p(),
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        }
    }
}

/// One entry of the model catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: String,

    /// Maximum tokens the model may return per reply
    pub max_output_tokens: u32,

    /// Conversation budget in (approximate) tokens
    pub context_length: usize,

    #[serde(default)]
    pub knowledge_cutoff: String,

    /// Whether image parts may be sent to this model
    #[serde(default)]
    pub vision: bool,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Allowlist of sender IDs. Empty = deny all. ["*"] = allow all.
    #[serde(default)]
    pub allowed_users: Vec<String>,

    /// Channel-specific settings (varies by platform)
    #[serde(flatten)]
    pub settings: HashMap<String, serde_json::Value>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.palaver/config.toml).
    ///
    /// Also checks environment variables:
    /// - `PALAVER_API_KEY` (highest priority), then `OPENAI_API_KEY`
    /// - `PALAVER_PROVIDER`, `PALAVER_MODEL`, `PALAVER_DATA_DIR`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if config.api_key.is_none() {
            config.api_key = std::env::var("PALAVER_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(provider) = std::env::var("PALAVER_PROVIDER") {
            config.default_provider = provider;
        }

        if let Ok(model) = std::env::var("PALAVER_MODEL") {
            config.generation.model = model;
        }

        if let Ok(dir) = std::env::var("PALAVER_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        // Overrides can break invariants the file satisfied
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".palaver")
    }

    /// The prompt registry record file.
    pub fn prompts_file(&self) -> PathBuf {
        self.data_dir.join("prompts.txt")
    }

    /// Directory holding one file per saved thread.
    pub fn threads_dir(&self) -> PathBuf {
        self.data_dir.join("threads")
    }

    /// Look up a model in the catalog.
    pub fn model(&self, name: &str) -> Option<&ModelConfig> {
        self.models.iter().find(|m| m.name == name)
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        let g = &self.generation;
        if !(0.0..=2.0).contains(&g.temperature) {
            return Err(ConfigError::ValidationError(
                "generation.temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&g.top_p) {
            return Err(ConfigError::ValidationError(
                "generation.top_p must be between 0.0 and 1.0".into(),
            ));
        }
        for (name, value) in [
            ("frequency_penalty", g.frequency_penalty),
            ("presence_penalty", g.presence_penalty),
        ] {
            if !(-2.0..=2.0).contains(&value) {
                return Err(ConfigError::ValidationError(format!(
                    "generation.{name} must be between -2.0 and 2.0"
                )));
            }
        }

        if self.command_prefix.is_empty() {
            return Err(ConfigError::ValidationError(
                "command_prefix must not be empty".into(),
            ));
        }

        if self.model(&g.model).is_none() {
            return Err(ConfigError::ValidationError(format!(
                "generation.model '{}' is not in the model catalog",
                g.model
            )));
        }
        for name in &self.hotswap_models {
            if self.model(name).is_none() {
                return Err(ConfigError::ValidationError(format!(
                    "hotswap model '{name}' is not in the model catalog"
                )));
            }
        }

        Ok(())
    }

    /// How long a conversation may stay quiet, if it may expire at all.
    pub fn conversation_idle_timeout(&self) -> Option<std::time::Duration> {
        (self.conversation_idle_secs > 0)
            .then(|| std::time::Duration::from_secs(self.conversation_idle_secs))
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            command_prefix: default_command_prefix(),
            initial_prompt: default_initial_prompt(),
            data_dir: default_data_dir(),
            conversation_idle_secs: default_conversation_idle_secs(),
            generation: GenerationConfig::default(),
            models: default_models(),
            hotswap_models: default_hotswap_models(),
            providers: HashMap::new(),
            channels_config: HashMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
