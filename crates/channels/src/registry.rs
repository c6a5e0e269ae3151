//! Channel registry: manages all active channel instances.
//!
//! Merges inbound messages from every channel into one stream and dispatches
//! replies back to the channel they came from.

use std::collections::HashMap;
use std::sync::Arc;

use palaver_core::channel::{Channel, ChannelMessage};
use palaver_core::error::ChannelError;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::cli::CliChannel;
use crate::discord::{DiscordChannel, DiscordConfig};

/// Central registry holding all enabled channel instances.
pub struct ChannelRegistry {
    channels: HashMap<String, Arc<dyn Channel>>,
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            channels: HashMap::new(),
        }
    }

    /// Register a channel adapter.
    pub fn register(&mut self, channel: Arc<dyn Channel>) {
        let name = channel.name().to_string();
        info!(channel = %name, "Registered channel");
        self.channels.insert(name, channel);
    }

    /// Get a channel by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Channel>> {
        self.channels.get(name)
    }

    /// List all registered channel names.
    pub fn list(&self) -> Vec<String> {
        self.channels.keys().cloned().collect()
    }

    /// Number of registered channels.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Start all channels and merge their message streams into one receiver.
    ///
    /// Messages from senders a channel does not allow never reach the
    /// merged stream.
    pub async fn start_all(
        &self,
    ) -> Result<mpsc::Receiver<(String, Result<ChannelMessage, ChannelError>)>, ChannelError> {
        let (merged_tx, merged_rx) = mpsc::channel(256);

        for (name, channel) in &self.channels {
            let rx = channel.start().await?;
            let tx = merged_tx.clone();
            let channel_name = name.clone();
            let gate = Arc::clone(channel);

            tokio::spawn(async move {
                let mut rx = rx;
                while let Some(msg) = rx.recv().await {
                    if let Ok(m) = &msg {
                        if !gate.is_allowed(&m.sender_id) {
                            warn!(channel = %channel_name, sender = %m.sender_id, "Dropping message from disallowed sender");
                            continue;
                        }
                    }
                    if tx.send((channel_name.clone(), msg)).await.is_err() {
                        break; // Merged receiver dropped
                    }
                }
            });

            info!(channel = %name, "Started channel");
        }

        Ok(merged_rx)
    }

    /// Send a message to a specific channel.
    pub async fn send_to(
        &self,
        channel_name: &str,
        chat_id: &str,
        content: &str,
    ) -> Result<(), ChannelError> {
        let channel = self.channels.get(channel_name).ok_or_else(|| {
            ChannelError::NotConfigured(format!("Channel '{}' not found", channel_name))
        })?;

        channel.send(chat_id, content).await
    }

    /// Build a registry holding every channel enabled in config.
    ///
    /// Unknown channel names are skipped with a warning.
    pub fn from_config(config: &palaver_config::AppConfig) -> Self {
        let mut registry = Self::new();
        for (name, channel_config) in &config.channels_config {
            if !channel_config.enabled {
                continue;
            }
            match name.as_str() {
                "discord" => registry.register(Arc::new(DiscordChannel::new(
                    DiscordConfig::from_channel_config(channel_config),
                ))),
                "cli" => registry.register(Arc::new(CliChannel::new())),
                other => warn!(channel = %other, "Unknown channel in config, skipping"),
            }
        }
        registry
    }

    /// Stop all channels gracefully.
    pub async fn stop_all(&self) {
        for (name, channel) in &self.channels {
            if let Err(e) = channel.stop().await {
                warn!(channel = %name, error = %e, "Failed to stop channel");
            }
        }
    }

    /// Run health checks on all channels.
    pub async fn health_check_all(&self) -> HashMap<String, bool> {
        let mut results = HashMap::new();
        for (name, channel) in &self.channels {
            let healthy = channel.health_check().await.unwrap_or(false);
            results.insert(name.clone(), healthy);
        }
        results
    }
}
