//! The live turn history of one conversation.
//!
//! `history[0]` is always the pinned system turn holding the active
//! prompt's text. Everything after it is user and assistant turns in
//! arrival order; the budget policy evicts from the front of that tail.

use palaver_core::error::{AssistantError, StorageError};
use palaver_core::message::{ContentPart, Message, Role, render_transcript};
use palaver_core::store::ThreadSnapshot;
use tracing::debug;

use crate::token::estimate_messages_tokens;

#[derive(Debug, Clone, PartialEq)]
pub struct ConversationThread {
    history: Vec<Message>,
    active_prompt_name: String,
}

impl ConversationThread {
    /// A fresh thread seeded with the named prompt.
    pub fn new(prompt_name: impl Into<String>, prompt_text: &str) -> Self {
        Self {
            history: vec![Message::system(prompt_text)],
            active_prompt_name: prompt_name.into(),
        }
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// Always false: the pinned system turn cannot be removed.
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn active_prompt_name(&self) -> &str {
        &self.active_prompt_name
    }

    pub fn set_active_prompt_name(&mut self, name: impl Into<String>) {
        self.active_prompt_name = name.into();
    }

    /// Text of the pinned system turn.
    pub fn system_text(&self) -> String {
        self.history.first().map(Message::text).unwrap_or_default()
    }

    /// Drop every turn and start over from `prompt_text`.
    pub fn reset(&mut self, prompt_text: &str) {
        self.history.clear();
        self.history.push(Message::system(prompt_text));
    }

    /// Reset onto a different prompt.
    pub fn reset_to(&mut self, prompt_name: impl Into<String>, prompt_text: &str) {
        self.active_prompt_name = prompt_name.into();
        self.reset(prompt_text);
    }

    /// Swap the pinned system text while keeping the turns.
    pub fn replace_system(&mut self, prompt_name: impl Into<String>, prompt_text: &str) {
        self.active_prompt_name = prompt_name.into();
        match self.history.first_mut() {
            Some(first) => *first = Message::system(prompt_text),
            None => self.history.push(Message::system(prompt_text)),
        }
    }

    /// Append a turn. No budget check happens here.
    pub fn append(&mut self, role: Role, parts: Vec<ContentPart>) {
        self.history.push(Message::new(role, parts));
    }

    pub fn approx_token_length(&self) -> usize {
        estimate_messages_tokens(&self.history)
    }

    /// Evict the oldest non-system turns until the estimate fits `max_tokens`
    /// or only the system turn is left. Returns how many turns were evicted.
    pub fn enforce_budget(&mut self, max_tokens: usize) -> usize {
        let mut evicted = 0;
        while self.history.len() > 1 && self.approx_token_length() > max_tokens {
            self.history.remove(1);
            evicted += 1;
        }
        if evicted > 0 {
            debug!(
                evicted,
                remaining = self.history.len(),
                tokens = self.approx_token_length(),
                max_tokens,
                "Evicted turns to fit budget"
            );
        }
        evicted
    }

    pub fn render(&self) -> String {
        render_transcript(&self.history)
    }

    pub fn serialize(&self) -> ThreadSnapshot {
        ThreadSnapshot::new(self.active_prompt_name.clone(), self.history.clone())
    }

    /// Rebuild a thread from a snapshot. The snapshot must start with a
    /// system turn.
    pub fn deserialize(snapshot: ThreadSnapshot) -> Result<Self, AssistantError> {
        match snapshot.history.first() {
            Some(first) if first.role() == Role::System => Ok(Self {
                history: snapshot.history,
                active_prompt_name: snapshot.prompt_name,
            }),
            _ => Err(StorageError::Corrupt(format!(
                "thread {} has no pinned system turn",
                snapshot.id
            ))
            .into()),
        }
    }
}
