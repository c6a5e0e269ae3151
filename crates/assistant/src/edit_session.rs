//! The interactive `modify prompts` flow.
//!
//! A small state machine: each utterance moves it one step and produces one
//! reply. Registry failures are reported and leave the session where it
//! was, so the user can simply try again.

use palaver_core::error::AssistantError;
use palaver_memory::SEP;
use tracing::debug;

use crate::registry::{EMPTY_PROMPT, PromptRegistry};
use crate::router::error_reply;
use crate::thread::ConversationThread;

/// Where the edit flow currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditState {
    #[default]
    Idle,
    AwaitingOperation,
    EditName,
    EditBody,
    Add,
    Delete,
    RenameOld,
    RenameNew,
}

#[derive(Debug, Default)]
pub struct PromptEditSession {
    state: EditState,
    /// Name carried from `EditName` to `EditBody`, or `RenameOld` to `RenameNew`.
    stash: Option<String>,
}

impl PromptEditSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> EditState {
        self.state
    }

    pub fn stash(&self) -> Option<&str> {
        self.stash.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.state != EditState::Idle
    }

    /// Start the flow and show the current prompts.
    pub fn open(&mut self, registry: &PromptRegistry) -> String {
        self.state = EditState::AwaitingOperation;
        self.stash = None;
        format!(
            "These are the existing prompts:\n{}\nDo you want to edit an existing prompt, add a new prompt, delete a prompt, or change a prompt's name? (`edit` `add` `delete` `changename`)\nYou can stop this process at any time with `cancel`.",
            registry.listing()
        )
    }

    /// Feed one utterance (command prefix already stripped) to the flow.
    pub fn handle(
        &mut self,
        input: &str,
        registry: &mut PromptRegistry,
        thread: &mut ConversationThread,
    ) -> String {
        let word = input.trim();
        if self.is_open() && word == "cancel" {
            self.finish();
            return "Ok, cancelling.".to_string();
        }

        let before = self.state;
        let result = match self.state {
            EditState::Idle if word == "modify prompts" => Ok(self.open(registry)),
            EditState::Idle => Err(AssistantError::State(
                "No prompt edit in progress. Start one with `modify prompts`.".into(),
            )),
            EditState::AwaitingOperation => self.choose_operation(word),
            EditState::EditName => self.choose_edit_target(word, registry),
            EditState::EditBody => self.apply_edit(word, registry),
            EditState::Add => self.apply_add(word, registry),
            EditState::Delete => self.apply_delete(word, registry, thread),
            EditState::RenameOld => self.choose_rename_target(word, registry, thread),
            EditState::RenameNew => self.apply_rename(word, registry, thread),
        };

        match result {
            Ok(reply) => {
                debug!(from = ?before, to = ?self.state, "Prompt edit step");
                reply
            }
            Err(err) => {
                debug!(state = ?self.state, error = %err, "Prompt edit step refused");
                error_reply(&err)
            }
        }
    }

    fn finish(&mut self) {
        self.state = EditState::Idle;
        self.stash = None;
    }

    fn choose_operation(&mut self, word: &str) -> Result<String, AssistantError> {
        let (next, reply) = match word {
            "edit" => (
                EditState::EditName,
                "Ok, which prompt would you like to edit? [enter prompt name]".to_string(),
            ),
            "add" => (
                EditState::Add,
                format!("Ok, write a prompt in this format: [name]{SEP}[PROMPT] w/o the square brackets."),
            ),
            "delete" => (
                EditState::Delete,
                "Ok, which prompt would you like to delete? [enter prompt name]".to_string(),
            ),
            "changename" => (
                EditState::RenameOld,
                "Ok, which prompt name would you like to rename? [enter prompt name]".to_string(),
            ),
            _ => {
                return Err(AssistantError::State(
                    "Invalid response, please try again.".into(),
                ));
            }
        };
        self.state = next;
        Ok(reply)
    }

    fn choose_edit_target(
        &mut self,
        name: &str,
        registry: &PromptRegistry,
    ) -> Result<String, AssistantError> {
        registry.get(name)?;
        if name == EMPTY_PROMPT {
            return Err(AssistantError::ProtectedEntry(name.to_string()));
        }
        self.stash = Some(name.to_string());
        self.state = EditState::EditBody;
        Ok(format!(
            "Ok, you said to edit {name}.\nSend me the new prompt for this prompt name. (just the new prompt in its entirety)"
        ))
    }

    fn apply_edit(
        &mut self,
        text: &str,
        registry: &mut PromptRegistry,
    ) -> Result<String, AssistantError> {
        let Some(name) = self.stash.clone() else {
            self.finish();
            return Err(AssistantError::State(
                "Lost track of which prompt to edit, please start over.".into(),
            ));
        };
        registry.set_text(&name, text)?;
        self.finish();
        Ok(format!("Updated '{name}' to '{text}'"))
    }

    fn apply_add(
        &mut self,
        input: &str,
        registry: &mut PromptRegistry,
    ) -> Result<String, AssistantError> {
        let Some((name, text)) = input.split_once(SEP) else {
            return Err(AssistantError::usage(format!("[name]{SEP}[PROMPT]")));
        };
        let name = name.trim();
        registry.add(name, text)?;
        self.finish();
        Ok(format!("Added '{name}' with prompt '{text}'"))
    }

    fn apply_delete(
        &mut self,
        name: &str,
        registry: &mut PromptRegistry,
        thread: &ConversationThread,
    ) -> Result<String, AssistantError> {
        registry.get(name)?;
        if name == thread.active_prompt_name() {
            return Err(AssistantError::ProtectedEntry(name.to_string()));
        }
        registry.delete(name)?;
        self.finish();
        Ok(format!("Deleted '{name}'"))
    }

    fn choose_rename_target(
        &mut self,
        name: &str,
        registry: &PromptRegistry,
        thread: &ConversationThread,
    ) -> Result<String, AssistantError> {
        registry.get(name)?;
        let own = usize::from(thread.active_prompt_name() == name);
        if name == EMPTY_PROMPT || registry.users(name) > own {
            return Err(AssistantError::ProtectedEntry(name.to_string()));
        }
        self.stash = Some(name.to_string());
        self.state = EditState::RenameNew;
        Ok(format!("Ok, what would you like to change the {name} to?"))
    }

    fn apply_rename(
        &mut self,
        new: &str,
        registry: &mut PromptRegistry,
        thread: &mut ConversationThread,
    ) -> Result<String, AssistantError> {
        let Some(old) = self.stash.clone() else {
            self.finish();
            return Err(AssistantError::State(
                "Lost track of which prompt to rename, please start over.".into(),
            ));
        };
        let ours = thread.active_prompt_name() == old;
        if ours {
            registry.release(&old);
        }
        let renamed = registry.rename(&old, new);
        if ours {
            registry.claim(if renamed.is_ok() { new } else { old.as_str() });
        }
        renamed?;
        if ours {
            thread.set_active_prompt_name(new);
        }
        self.finish();
        Ok(format!("Changed '{old}' to '{new}'"))
    }
}
