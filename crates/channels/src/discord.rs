//! Discord channel adapter (stub).
//!
//! Implements the Channel trait for the Discord Bot API.
//! In production, this would use `serenity` for the WebSocket gateway.
//! Currently a stub with in-process message injection for testing; outgoing
//! messages are split to Discord's length limit and kept in an outbox.

use async_trait::async_trait;
use palaver_config::ChannelConfig;
use palaver_core::channel::{Channel, ChannelId, ChannelMessage};
use palaver_core::error::ChannelError;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Discord rejects messages longer than this many characters.
pub const DISCORD_MESSAGE_LIMIT: usize = 2000;

/// Discord channel configuration.
#[derive(Clone)]
pub struct DiscordConfig {
    /// Bot token from Discord Developer Portal.
    pub bot_token: String,
    /// Allowed user IDs. Empty = deny all, ["*"] = allow all.
    pub allowed_users: Vec<String>,
    /// Channel IDs to listen in. Empty = all channels.
    pub channel_filter: Vec<String>,
}

impl DiscordConfig {
    /// Read `bot_token` and `channel_filter` from a `[channels_config.discord]` table.
    pub fn from_channel_config(config: &ChannelConfig) -> Self {
        let bot_token = config
            .settings
            .get("bot_token")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let channel_filter = config
            .settings
            .get("channel_filter")
            .and_then(|v| v.as_array())
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| id.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            bot_token,
            allowed_users: config.allowed_users.clone(),
            channel_filter,
        }
    }
}

impl std::fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("bot_token", &"[REDACTED]")
            .field("allowed_users", &self.allowed_users)
            .field("channel_filter", &self.channel_filter)
            .finish()
    }
}

/// Discord channel adapter.
pub struct DiscordChannel {
    config: DiscordConfig,
    channel_id: ChannelId,
    inject_tx: tokio::sync::Mutex<Option<mpsc::Sender<Result<ChannelMessage, ChannelError>>>>,
    outbox: tokio::sync::Mutex<Vec<(String, String)>>,
}

impl DiscordChannel {
    pub fn new(config: DiscordConfig) -> Self {
        Self {
            config,
            channel_id: ChannelId("discord".into()),
            inject_tx: tokio::sync::Mutex::new(None),
            outbox: tokio::sync::Mutex::new(Vec::new()),
        }
    }

    /// Inject a message as if it came from Discord (for testing).
    ///
    /// Messages from filtered-out channels are dropped silently.
    pub async fn inject_message(&self, msg: ChannelMessage) -> Result<(), ChannelError> {
        if !self.listens_in(&msg.chat_id) {
            debug!(chat_id = %msg.chat_id, "Ignoring message outside channel filter");
            return Ok(());
        }

        let guard = self.inject_tx.lock().await;
        if let Some(tx) = guard.as_ref() {
            tx.send(Ok(msg))
                .await
                .map_err(|_| ChannelError::ConnectionLost("Message channel closed".into()))
        } else {
            Err(ChannelError::ConnectionLost("Channel not started".into()))
        }
    }

    /// Every `(chat_id, chunk)` sent so far.
    pub async fn sent(&self) -> Vec<(String, String)> {
        self.outbox.lock().await.clone()
    }

    fn listens_in(&self, chat_id: &str) -> bool {
        self.config.channel_filter.is_empty() || self.config.channel_filter.iter().any(|c| c == chat_id)
    }
}

/// Split a reply into chunks Discord will accept, preferring line breaks.
///
/// Counts characters, not bytes. A single line longer than the limit is cut
/// hard at the limit.
pub fn split_message(content: &str, limit: usize) -> Vec<String> {
    if content.chars().count() <= limit {
        return vec![content.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in content.split_inclusive('\n') {
        let line_len = line.chars().count();

        if current_len + line_len <= limit {
            current.push_str(line);
            current_len += line_len;
            continue;
        }

        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if line_len <= limit {
            current.push_str(line);
            current_len = line_len;
            continue;
        }

        let chars: Vec<char> = line.chars().collect();
        for piece in chars.chunks(limit) {
            if piece.len() == limit {
                chunks.push(piece.iter().collect());
            } else {
                current = piece.iter().collect();
                current_len = piece.len();
            }
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[async_trait]
impl Channel for DiscordChannel {
    fn name(&self) -> &str {
        "discord"
    }

    fn id(&self) -> &ChannelId {
        &self.channel_id
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
        info!("Discord channel starting (stub mode)");
        let (tx, rx) = mpsc::channel(64);
        *self.inject_tx.lock().await = Some(tx);
        Ok(rx)
    }

    async fn send(&self, chat_id: &str, content: &str) -> Result<(), ChannelError> {
        let chunks = split_message(content, DISCORD_MESSAGE_LIMIT);
        info!(
            chat_id = %chat_id,
            content_len = content.len(),
            chunks = chunks.len(),
            "Discord send (stub)"
        );
        let mut outbox = self.outbox.lock().await;
        outbox.extend(chunks.into_iter().map(|c| (chat_id.to_string(), c)));
        Ok(())
    }

    async fn send_typing(&self, chat_id: &str) -> Result<(), ChannelError> {
        debug!(chat_id = %chat_id, "Discord typing (stub)");
        Ok(())
    }

    fn is_allowed(&self, sender_id: &str) -> bool {
        if self.config.allowed_users.is_empty() {
            return false;
        }
        if self.config.allowed_users.iter().any(|u| u == "*") {
            return true;
        }
        self.config.allowed_users.iter().any(|u| u == sender_id)
    }

    async fn stop(&self) -> Result<(), ChannelError> {
        info!("Discord channel stopping");
        *self.inject_tx.lock().await = None;
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, ChannelError> {
        Ok(!self.config.bot_token.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> DiscordConfig {
        DiscordConfig {
            bot_token: "test-discord-token".into(),
            allowed_users: vec!["*".into()],
            channel_filter: vec![],
        }
    }

    #[test]
    fn channel_name_and_id() {
        let ch = DiscordChannel::new(test_config());
        assert_eq!(ch.name(), "discord");
        assert_eq!(ch.id().0, "discord");
    }

    #[test]
    fn allowlist_checks() {
        let ch = DiscordChannel::new(test_config());
        assert!(ch.is_allowed("anyone"));

        let specific = DiscordChannel::new(DiscordConfig {
            allowed_users: vec!["user1".into()],
            ..test_config()
        });
        assert!(specific.is_allowed("user1"));
        assert!(!specific.is_allowed("user2"));

        let deny_all = DiscordChannel::new(DiscordConfig {
            allowed_users: vec![],
            ..test_config()
        });
        assert!(!deny_all.is_allowed("anyone"));
    }

    #[test]
    fn config_from_settings_table() {
        let parsed: ChannelConfig = toml::from_str(
            r#"
enabled = true
allowed_users = ["42"]
bot_token = "abc"
channel_filter = ["general"]
"#,
        )
        .unwrap();
        let config = DiscordConfig::from_channel_config(&parsed);
        assert_eq!(config.bot_token, "abc");
        assert_eq!(config.allowed_users, vec!["42"]);
        assert_eq!(config.channel_filter, vec!["general"]);
        assert!(!format!("{config:?}").contains("abc"));
    }

    #[tokio::test]
    async fn start_inject_and_receive() {
        let ch = DiscordChannel::new(test_config());
        let mut rx = ch.start().await.unwrap();

        let msg = ChannelMessage::text("discord", "guild#channel", "user456", "Hey from Discord!");
        ch.inject_message(msg).await.unwrap();
        let received = rx.recv().await.unwrap().unwrap();
        assert_eq!(received.content, "Hey from Discord!");
    }

    #[tokio::test]
    async fn filtered_channels_are_ignored() {
        let ch = DiscordChannel::new(DiscordConfig {
            channel_filter: vec!["general".into()],
            ..test_config()
        });
        let mut rx = ch.start().await.unwrap();

        ch.inject_message(ChannelMessage::text("discord", "random", "u", "ignored"))
            .await
            .unwrap();
        ch.inject_message(ChannelMessage::text("discord", "general", "u", "kept"))
            .await
            .unwrap();
        assert_eq!(rx.recv().await.unwrap().unwrap().content, "kept");
    }

    #[tokio::test]
    async fn inject_before_start_fails() {
        let ch = DiscordChannel::new(test_config());
        let msg = ChannelMessage::text("discord", "c", "u", "too early");
        assert!(ch.inject_message(msg).await.is_err());
    }

    #[tokio::test]
    async fn long_replies_are_chunked() {
        let ch = DiscordChannel::new(test_config());
        let reply = "x".repeat(4500);
        ch.send("channel1", &reply).await.unwrap();

        let sent = ch.sent().await;
        assert_eq!(sent.len(), 3);
        assert!(sent.iter().all(|(chat, chunk)| chat == "channel1"
            && chunk.chars().count() <= DISCORD_MESSAGE_LIMIT));
        let joined: String = sent.into_iter().map(|(_, c)| c).collect();
        assert_eq!(joined, reply);
    }

    #[tokio::test]
    async fn send_and_health() {
        let ch = DiscordChannel::new(test_config());
        assert!(ch.send("channel1", "Hello!").await.is_ok());
        assert_eq!(ch.sent().await, vec![("channel1".to_string(), "Hello!".to_string())]);
        assert!(ch.health_check().await.unwrap());
    }

    #[test]
    fn split_prefers_line_breaks() {
        let line = format!("{}\n", "a".repeat(1500));
        let content = format!("{line}{line}");
        let chunks = split_message(&content, DISCORD_MESSAGE_LIMIT);
        assert_eq!(chunks, vec![line.clone(), line]);
    }

    #[test]
    fn split_short_message_is_untouched() {
        assert_eq!(split_message("hi", DISCORD_MESSAGE_LIMIT), vec!["hi"]);
        assert_eq!(split_message("", DISCORD_MESSAGE_LIMIT), vec![""]);
    }

    #[test]
    fn split_counts_characters_not_bytes() {
        let content = "é".repeat(2000);
        assert_eq!(split_message(&content, DISCORD_MESSAGE_LIMIT).len(), 1);
    }
}
