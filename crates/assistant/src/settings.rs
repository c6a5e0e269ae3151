//! Typed generation settings and the model catalog they draw limits from.

use palaver_config::{AppConfig, ModelConfig};
use palaver_core::error::AssistantError;
use palaver_core::provider::GenerationParams;
use tracing::debug;

const GPTSET_USAGE: &str = "gptset <setting_name> <new_value>";

/// The models a conversation may switch to, with their limits.
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    models: Vec<ModelConfig>,
}

impl ModelCatalog {
    pub fn new(models: Vec<ModelConfig>) -> Self {
        Self { models }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.models.clone())
    }

    pub fn get(&self, name: &str) -> Result<&ModelConfig, AssistantError> {
        self.models
            .iter()
            .find(|m| m.name == name)
            .ok_or_else(|| AssistantError::not_found("model", name))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.models.iter().map(|m| m.name.as_str())
    }

    /// Reply for `list models`.
    pub fn listing(&self) -> String {
        let mut out = String::from("Available models:\n");
        for m in &self.models {
            out.push_str(&format!(
                "{}: max output {}, context {}, knowledge cutoff {}{}\n",
                m.name,
                m.max_output_tokens,
                m.context_length,
                m.knowledge_cutoff,
                if m.vision { ", vision" } else { "" }
            ));
        }
        out
    }
}

/// Sampling parameters plus the limits of the selected model.
///
/// Model limits are only ever copied from the catalog, so they always
/// describe the current model.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    model: String,
    temperature: f32,
    top_p: f32,
    frequency_penalty: f32,
    presence_penalty: f32,
    max_output_tokens: u32,
    context_length: usize,
    knowledge_cutoff: String,
    vision: bool,
}

impl GenerationSettings {
    /// Defaults for `model`, sampling parameters at their neutral values.
    pub fn for_model(model: &ModelConfig) -> Self {
        Self {
            model: model.name.clone(),
            temperature: 0.0,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            max_output_tokens: model.max_output_tokens,
            context_length: model.context_length,
            knowledge_cutoff: model.knowledge_cutoff.clone(),
            vision: model.vision,
        }
    }

    pub fn from_config(config: &AppConfig, catalog: &ModelCatalog) -> Result<Self, AssistantError> {
        let g = &config.generation;
        let mut settings = Self::for_model(catalog.get(&g.model)?);
        settings.temperature = check_range("temperature", g.temperature, 0.0, 2.0)?;
        settings.top_p = check_range("top_p", g.top_p, 0.0, 1.0)?;
        settings.frequency_penalty = check_range("frequency_penalty", g.frequency_penalty, -2.0, 2.0)?;
        settings.presence_penalty = check_range("presence_penalty", g.presence_penalty, -2.0, 2.0)?;
        Ok(settings)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Conversation budget in approximate tokens.
    pub fn context_length(&self) -> usize {
        self.context_length
    }

    pub fn vision(&self) -> bool {
        self.vision
    }

    /// Switch models, taking the new model's limits from the catalog.
    pub fn set_model(&mut self, name: &str, catalog: &ModelCatalog) -> Result<(), AssistantError> {
        let entry = catalog.get(name)?;
        self.model = entry.name.clone();
        self.max_output_tokens = entry.max_output_tokens;
        self.context_length = entry.context_length;
        self.knowledge_cutoff = entry.knowledge_cutoff.clone();
        self.vision = entry.vision;
        Ok(())
    }

    /// Apply `gptset <key> <value>`. Nothing changes unless the value is valid.
    pub fn set(&mut self, key: &str, value: &str, catalog: &ModelCatalog) -> Result<(), AssistantError> {
        let value = value.trim();
        match key {
            "model" => self.set_model(value, catalog)?,
            "temperature" => self.temperature = check_range(key, parse(value)?, 0.0, 2.0)?,
            "top_p" => self.top_p = check_range(key, parse(value)?, 0.0, 1.0)?,
            "frequency_penalty" => {
                self.frequency_penalty = check_range(key, parse(value)?, -2.0, 2.0)?
            }
            "presence_penalty" => {
                self.presence_penalty = check_range(key, parse(value)?, -2.0, 2.0)?
            }
            "max_tokens" => self.max_output_tokens = positive(key, parse(value)?)?,
            "context_length" => self.context_length = positive(key, parse(value)?)?,
            "prompt" => {
                return Err(AssistantError::usage("change prompt, <prompt name>"));
            }
            "knowledge_cutoff" | "vision" => {
                return Err(AssistantError::ProtectedEntry(key.to_string()));
            }
            other => return Err(AssistantError::not_found("setting", other)),
        }
        debug!(setting = %key, value = %value, "Generation setting changed");
        Ok(())
    }

    /// Parameters for the next provider call.
    pub fn params(&self) -> GenerationParams {
        GenerationParams {
            model: self.model.clone(),
            temperature: self.temperature,
            top_p: self.top_p,
            frequency_penalty: self.frequency_penalty,
            presence_penalty: self.presence_penalty,
            max_output_tokens: Some(self.max_output_tokens),
        }
    }

    /// Reply for `gptsettings`: one `name (type) = value` line per setting.
    pub fn display(&self, prompt_name: &str) -> String {
        [
            format!("model (str) = {}", self.model),
            format!("prompt (str) = {prompt_name}"),
            format!("temperature (float) = {}", self.temperature),
            format!("top_p (float) = {}", self.top_p),
            format!("frequency_penalty (float) = {}", self.frequency_penalty),
            format!("presence_penalty (float) = {}", self.presence_penalty),
            format!("max_tokens (int) = {}", self.max_output_tokens),
            format!("context_length (int) = {}", self.context_length),
            format!("knowledge_cutoff (str) = {}", self.knowledge_cutoff),
            format!("vision (bool) = {}", self.vision),
        ]
        .into_iter()
        .map(|line| line + "\n")
        .collect()
    }
}

fn parse<T: std::str::FromStr>(value: &str) -> Result<T, AssistantError> {
    value.parse().map_err(|_| AssistantError::usage(GPTSET_USAGE))
}

fn check_range(key: &str, value: f32, min: f32, max: f32) -> Result<f32, AssistantError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(AssistantError::usage(format!("gptset {key} <{min} to {max}>")))
    }
}

fn positive<T: PartialOrd + Default>(key: &str, value: T) -> Result<T, AssistantError> {
    if value > T::default() {
        Ok(value)
    } else {
        Err(AssistantError::usage(format!("gptset {key} <positive integer>")))
    }
}
