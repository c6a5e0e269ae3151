//! Channel trait: the abstraction over chat platforms.
//!
//! A Channel connects Palaver to a messaging platform (Discord, CLI, ...).
//! It receives messages from users and sends replies back. The channel
//! adapter is also responsible for resolving attachments: by the time a
//! [`ChannelMessage`] reaches the assistant, documents carry their extracted
//! text and images carry a fetchable URL.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ChannelError;
use crate::message::{ContentPart, ConversationKey};

/// Unique identifier for a channel instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub String);

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message received from a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMessage {
    /// The channel this message belongs to
    pub channel_id: ChannelId,

    /// Sender identifier (platform-specific user ID)
    pub sender_id: String,

    /// Human-readable sender name (if available)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,

    /// The text content
    pub content: String,

    /// The chat/group/DM identifier within the channel
    pub chat_id: String,

    /// Attachments, already resolved by the adapter
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl ChannelMessage {
    /// A plain text message with no attachments.
    pub fn text(
        channel: impl Into<String>,
        chat_id: impl Into<String>,
        sender_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            channel_id: ChannelId(channel.into()),
            sender_id: sender_id.into(),
            sender_name: None,
            content: content.into(),
            chat_id: chat_id.into(),
            attachments: vec![],
        }
    }

    pub fn conversation_key(&self) -> ConversationKey {
        ConversationKey::new(self.channel_id.0.clone(), self.chat_id.clone())
    }

    /// Typed parts for every usable attachment, in arrival order.
    ///
    /// Documents without extracted text and audio/video are skipped.
    pub fn attachment_parts(&self) -> Vec<ContentPart> {
        self.attachments
            .iter()
            .filter_map(|a| match a.kind {
                AttachmentKind::Image => Some(ContentPart::Image {
                    url: a.url.clone(),
                    filename: a.filename.clone(),
                }),
                AttachmentKind::Document => a
                    .extracted_text
                    .as_ref()
                    .map(|text| ContentPart::document(a.filename.clone(), text.clone())),
                AttachmentKind::Other => None,
            })
            .collect()
    }
}

/// An attachment in a channel message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    /// Type of attachment
    pub kind: AttachmentKind,

    /// URL or file path
    pub url: String,

    /// Optional filename
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    /// Text pulled out of the file by the adapter (documents only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    Image,
    Document,
    Other,
}

/// The core Channel trait.
///
/// Implementations handle platform-specific connection logic, message
/// formatting, length limits, and authentication.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable channel name (e.g., "discord", "cli").
    fn name(&self) -> &str;

    /// Unique ID for this channel instance.
    fn id(&self) -> &ChannelId;

    /// Start listening for incoming messages.
    async fn start(
        &self,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<ChannelMessage, ChannelError>>,
        ChannelError,
    >;

    /// Send a reply to a specific chat.
    async fn send(&self, chat_id: &str, content: &str) -> std::result::Result<(), ChannelError>;

    /// Send a typing indicator (if the platform supports it).
    async fn send_typing(&self, _chat_id: &str) -> std::result::Result<(), ChannelError> {
        Ok(()) // No-op default
    }

    /// Check if a sender is allowed (allowlist check).
    fn is_allowed(&self, sender_id: &str) -> bool;

    /// Stop the channel gracefully.
    async fn stop(&self) -> std::result::Result<(), ChannelError> {
        Ok(())
    }

    /// Whether the channel is connected and operational.
    async fn health_check(&self) -> std::result::Result<bool, ChannelError> {
        Ok(true)
    }
}
