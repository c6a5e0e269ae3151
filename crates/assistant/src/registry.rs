//! The registry of named system prompts.
//!
//! Every mutation is applied to a copy of the mapping, flushed through the
//! [`PromptStore`], and only then committed. A failed flush leaves the
//! registry exactly as it was.
//!
//! Live conversations claim the prompt they are on. A claimed name cannot
//! be deleted or renamed from elsewhere, so no conversation is ever left
//! pointing at a prompt that no longer exists.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use palaver_core::error::AssistantError;
use palaver_core::store::PromptStore;
use palaver_memory::SEP;
use tracing::{debug, info};

/// The sentinel prompt. Always present, never deleted, renamed or edited.
pub const EMPTY_PROMPT: &str = "empty";

pub struct PromptRegistry {
    entries: BTreeMap<String, String>,
    active: String,
    /// Live conversations per prompt name. Never persisted.
    in_use: HashMap<String, usize>,
    store: Arc<dyn PromptStore>,
}

impl std::fmt::Debug for PromptRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptRegistry")
            .field("names", &self.entries.keys().collect::<Vec<_>>())
            .field("active", &self.active)
            .field("in_use", &self.in_use)
            .finish()
    }
}

impl PromptRegistry {
    /// Load the registry from its store, inserting and persisting the
    /// sentinel prompt if the record lacks it.
    pub fn open(store: Arc<dyn PromptStore>) -> Result<Self, AssistantError> {
        let mut entries = store.load()?;
        if !entries.contains_key(EMPTY_PROMPT) {
            entries.insert(EMPTY_PROMPT.to_string(), String::new());
            store.save(&entries)?;
        }
        info!(count = entries.len(), "Prompt registry loaded");
        Ok(Self {
            entries,
            active: EMPTY_PROMPT.to_string(),
            in_use: HashMap::new(),
            store,
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Never true: the sentinel is always present.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Result<&str, AssistantError> {
        self.entries
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| AssistantError::not_found("prompt", name))
    }

    /// The most recently selected prompt.
    pub fn active(&self) -> &str {
        &self.active
    }

    pub fn set_active(&mut self, name: &str) -> Result<(), AssistantError> {
        self.get(name)?;
        self.active = name.to_string();
        Ok(())
    }

    /// Record that one more live conversation is on `name`.
    pub fn claim(&mut self, name: &str) {
        *self.in_use.entry(name.to_string()).or_default() += 1;
    }

    /// Drop one conversation's claim on `name`.
    pub fn release(&mut self, name: &str) {
        match self.in_use.get_mut(name) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                self.in_use.remove(name);
            }
            None => debug!(prompt = %name, "Released a prompt nobody claimed"),
        }
    }

    /// Move one conversation's claim from `old` to `new`.
    pub fn reassign(&mut self, old: &str, new: &str) {
        self.release(old);
        self.claim(new);
    }

    /// How many live conversations are on `name`.
    pub fn users(&self, name: &str) -> usize {
        self.in_use.get(name).copied().unwrap_or(0)
    }

    pub fn add(&mut self, name: &str, text: &str) -> Result<(), AssistantError> {
        validate_name(name)?;
        if self.contains(name) {
            return Err(AssistantError::DuplicateName(name.to_string()));
        }
        let mut next = self.entries.clone();
        next.insert(name.to_string(), text.to_string());
        self.commit(next)?;
        debug!(prompt = %name, "Prompt added");
        Ok(())
    }

    /// Replace the text of an existing prompt.
    pub fn set_text(&mut self, name: &str, text: &str) -> Result<(), AssistantError> {
        self.get(name)?;
        if name == EMPTY_PROMPT {
            return Err(AssistantError::ProtectedEntry(name.to_string()));
        }
        let mut next = self.entries.clone();
        next.insert(name.to_string(), text.to_string());
        self.commit(next)?;
        debug!(prompt = %name, "Prompt edited");
        Ok(())
    }

    pub fn delete(&mut self, name: &str) -> Result<(), AssistantError> {
        self.get(name)?;
        if name == EMPTY_PROMPT || name == self.active || self.users(name) > 0 {
            return Err(AssistantError::ProtectedEntry(name.to_string()));
        }
        let mut next = self.entries.clone();
        next.remove(name);
        self.commit(next)?;
        debug!(prompt = %name, "Prompt deleted");
        Ok(())
    }

    /// Rename a prompt. The active pointer follows the rename. A prompt a
    /// live conversation is on cannot be renamed; a conversation renaming
    /// its own prompt releases it first.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<(), AssistantError> {
        self.get(old)?;
        if old == EMPTY_PROMPT || self.users(old) > 0 {
            return Err(AssistantError::ProtectedEntry(old.to_string()));
        }
        validate_name(new)?;
        if self.contains(new) {
            return Err(AssistantError::DuplicateName(new.to_string()));
        }
        let mut next = self.entries.clone();
        if let Some(text) = next.remove(old) {
            next.insert(new.to_string(), text);
        }
        self.commit(next)?;
        if self.active == old {
            self.active = new.to_string();
        }
        debug!(from = %old, to = %new, "Prompt renamed");
        Ok(())
    }

    /// Human-readable listing of every prompt.
    pub fn listing(&self) -> String {
        self.entries
            .iter()
            .map(|(name, text)| format!("Name: {name}\nPrompt: {text}\n----\n"))
            .collect()
    }

    fn commit(&mut self, next: BTreeMap<String, String>) -> Result<(), AssistantError> {
        self.store.save(&next)?;
        self.entries = next;
        Ok(())
    }
}

/// Names end up as the key of a one-line record.
fn validate_name(name: &str) -> Result<(), AssistantError> {
    if name.trim().is_empty() || name.contains('\n') || name.contains(SEP) {
        return Err(AssistantError::usage(
            "prompt names must be non-empty, single-line and free of <SEP>",
        ));
    }
    Ok(())
}
