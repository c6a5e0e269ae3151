//! Message and conversation-key domain types.
//!
//! These are the value objects that flow through the entire system:
//! a channel receives text plus attachments, the transport adapter resolves
//! them into typed [`ContentPart`]s, and the assistant stores the resulting
//! [`Message`] in a conversation thread.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifies one conversation: a chat inside a channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConversationKey {
    pub channel: String,
    pub chat_id: String,
}

impl ConversationKey {
    pub fn new(channel: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            chat_id: chat_id.into(),
        }
    }
}

impl std::fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.channel, self.chat_id)
    }
}

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The pinned prompt at the head of every thread
    System,
    /// The end user
    User,
    /// The generation provider
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One typed piece of a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: String,
    },
    /// A reference the provider can fetch: an http(s) URL or a `data:` URL.
    Image {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
    },
    /// Text already extracted from an attached file (plain text, code, PDF).
    DocumentExtract {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
        text: String,
    },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn image(url: impl Into<String>) -> Self {
        Self::Image {
            url: url.into(),
            filename: None,
        }
    }

    pub fn document(filename: Option<String>, text: impl Into<String>) -> Self {
        Self::DocumentExtract {
            filename,
            text: text.into(),
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Self::Image { .. })
    }

    /// Transcript form: text verbatim, everything else as a placeholder token.
    pub fn render(&self) -> &str {
        match self {
            Self::Text { text } => text,
            Self::Image { .. } => "[image]",
            Self::DocumentExtract { .. } => "[document]",
        }
    }
}

/// A single turn in a conversation. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    role: Role,
    parts: Vec<ContentPart>,
    timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, parts: Vec<ContentPart>) -> Self {
        Self {
            role,
            parts,
            timestamp: Utc::now(),
        }
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, vec![ContentPart::text(content)])
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, vec![ContentPart::text(content)])
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, vec![ContentPart::text(content)])
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn parts(&self) -> &[ContentPart] {
        &self.parts
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Concatenation of all plain text parts, newline separated.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Human-readable form used by transcripts and snapshot previews.
    pub fn render(&self) -> String {
        let mut out = format!("{}:\n", self.role);
        for part in &self.parts {
            out.push_str(part.render());
            out.push('\n');
        }
        out
    }
}

/// Render a whole history, one block per message.
pub fn render_transcript(messages: &[Message]) -> String {
    messages.iter().map(Message::render).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = Message::user("Hello, assistant!");
        assert_eq!(msg.role(), Role::User);
        assert_eq!(msg.text(), "Hello, assistant!");
        assert_eq!(msg.parts().len(), 1);
    }

    #[test]
    fn non_text_parts_render_as_placeholders() {
        let msg = Message::new(
            Role::User,
            vec![
                ContentPart::text("look at this"),
                ContentPart::image("https://example.com/cat.png"),
                ContentPart::document(Some("notes.txt".into()), "secret contents"),
            ],
        );
        let rendered = msg.render();
        assert_eq!(rendered, "user:\nlook at this\n[image]\n[document]\n");
        assert!(!rendered.contains("secret contents"));
    }

    #[test]
    fn empty_system_message_renders_one_turn() {
        let rendered = render_transcript(&[Message::system("")]);
        assert_eq!(rendered, "system:\n\n");
    }

    #[test]
    fn message_serialization_roundtrip() {
        let msg = Message::new(
            Role::Assistant,
            vec![ContentPart::text("hi"), ContentPart::image("data:image/png;base64,AAAA")],
        );
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"kind\":\"image\""));
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn conversation_key_display() {
        let key = ConversationKey::new("discord", "guild#general");
        assert_eq!(key.to_string(), "discord:guild#general");
    }
}
