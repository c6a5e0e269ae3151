//! Per-conversation dispatch.
//!
//! A [`CommandRouter`] owns one conversation's thread, settings and edit
//! session. It never returns an error: every failure becomes a reply.

use palaver_core::error::{AssistantError, StorageError};
use palaver_core::message::{ContentPart, ConversationKey, Message, Role};
use palaver_core::provider::ProviderRequest;
use palaver_workflow::ReminderUnit;
use tracing::{debug, info, warn};

use crate::commands::{self, Command};
use crate::context::AssistantContext;
use crate::edit_session::PromptEditSession;
use crate::registry::EMPTY_PROMPT;
use crate::settings::GenerationSettings;
use crate::thread::ConversationThread;
use crate::token::estimate_tokens;

const EMPTY_COMMAND: &str = "Empty command provided.";
const UNKNOWN_COMMAND: &str = "Unknown command.";

/// Render an error as the reply the user sees.
pub(crate) fn error_reply(err: &AssistantError) -> String {
    match err {
        AssistantError::Provider(e) => {
            format!("Sorry, I couldn't get a reply from the model right now. ({e})")
        }
        AssistantError::Storage(_) => format!("Sorry, {err}"),
        AssistantError::ProtectedEntry(_) | AssistantError::DuplicateName(_) => {
            format!("Refused: {err}")
        }
        _ => err.to_string(),
    }
}

pub struct CommandRouter {
    key: ConversationKey,
    ctx: AssistantContext,
    thread: ConversationThread,
    settings: GenerationSettings,
    session: PromptEditSession,
}

impl CommandRouter {
    /// A fresh conversation on the configured initial prompt.
    pub async fn new(key: ConversationKey, ctx: AssistantContext) -> Self {
        let (name, text) = {
            let mut registry = ctx.registry.lock().await;
            let (name, text) = match registry.get(&ctx.initial_prompt) {
                Ok(text) => (ctx.initial_prompt.clone(), text.to_string()),
                Err(_) => (EMPTY_PROMPT.to_string(), String::new()),
            };
            registry.claim(&name);
            (name, text)
        };
        debug!(conversation = %key, prompt = %name, "Conversation started");
        Self {
            key,
            thread: ConversationThread::new(name, &text),
            settings: ctx.default_settings.clone(),
            session: PromptEditSession::new(),
            ctx,
        }
    }

    /// Give up this conversation's claim on its prompt. Call once, when the
    /// conversation ends.
    pub async fn release(&self) {
        self.ctx
            .registry
            .lock()
            .await
            .release(self.thread.active_prompt_name());
    }

    pub fn key(&self) -> &ConversationKey {
        &self.key
    }

    pub fn thread(&self) -> &ConversationThread {
        &self.thread
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    pub fn session(&self) -> &PromptEditSession {
        &self.session
    }

    /// Handle one utterance and produce its reply.
    pub async fn dispatch(&mut self, text: &str, attachments: Vec<ContentPart>) -> String {
        let prefix = self.ctx.prefix.clone();

        if self.session.is_open() {
            let body = text.strip_prefix(prefix.as_str()).unwrap_or(text);
            let mut registry = self.ctx.registry.lock().await;
            return self.session.handle(body, &mut registry, &mut self.thread);
        }

        let Some(body) = text.strip_prefix(prefix.as_str()) else {
            return self.converse(text, attachments).await;
        };

        let body = body.trim();
        if body.is_empty() {
            return EMPTY_COMMAND.to_string();
        }

        if let Some(reply) = self.run_literal(body).await {
            return reply;
        }
        self.interpret(text).await
    }

    /// Match `body` against the command table and run it. `None` if it is
    /// not a command.
    async fn run_literal(&mut self, body: &str) -> Option<String> {
        let expanded = commands::expand_shortcut(body.trim());
        let command = match commands::parse(&expanded, self.ctx.reminders_enabled())? {
            Ok(command) => command,
            Err(err) => return Some(error_reply(&err)),
        };

        info!(conversation = %self.key, command = ?command, "Running command");
        Some(match self.execute(command).await {
            Ok(reply) => reply,
            Err(err) => {
                debug!(conversation = %self.key, error = %err, "Command failed");
                error_reply(&err)
            }
        })
    }

    /// Show an unknown command to the model once. A reply that is itself a
    /// command runs through the literal table and nothing further.
    async fn interpret(&mut self, text: &str) -> String {
        let request = ProviderRequest {
            params: self.settings.params(),
            messages: vec![
                Message::system(commands::interpreter_prompt(
                    &self.ctx.prefix,
                    self.ctx.reminders_enabled(),
                )),
                Message::user(text),
            ],
        };

        let reply = match self.ctx.provider.complete(request).await {
            Ok(response) => response.text(),
            Err(err) => {
                warn!(conversation = %self.key, error = %err, "Interpreter call failed");
                return error_reply(&err.into());
            }
        };

        let Some(body) = reply.trim().strip_prefix(self.ctx.prefix.as_str()) else {
            return reply;
        };
        let body = body.trim().to_string();
        debug!(conversation = %self.key, command = %body, "Model suggested a command");
        match self.run_literal(&body).await {
            Some(result) => result,
            None => UNKNOWN_COMMAND.to_string(),
        }
    }

    /// Conversational turn: append, trim to budget, generate, append.
    ///
    /// The thread is only updated if generation succeeds.
    async fn converse(&mut self, text: &str, attachments: Vec<ContentPart>) -> String {
        let mut parts = Vec::with_capacity(attachments.len() + 1);
        if !text.is_empty() {
            parts.push(ContentPart::text(text));
        }
        parts.extend(attachments);

        let mut notice = String::new();
        if !self.settings.vision() {
            let (images, rest): (Vec<_>, Vec<_>) = parts.into_iter().partition(ContentPart::is_image);
            parts = rest;
            if !images.is_empty() {
                let names: Vec<&str> = images
                    .iter()
                    .filter_map(|p| match p {
                        ContentPart::Image { url, filename } => Some(filename.as_deref().unwrap_or(url)),
                        _ => None,
                    })
                    .collect();
                notice = format!(
                    "Note: {} cannot see images, so these were discarded: {}\n\n",
                    self.settings.model(),
                    names.join(", ")
                );
            }
        }

        if parts.is_empty() {
            return format!("{notice}Nothing to send.");
        }

        let mut next = self.thread.clone();
        next.append(Role::User, parts);
        next.enforce_budget(self.settings.context_length());

        let request = ProviderRequest {
            params: self.settings.params(),
            messages: next.history().to_vec(),
        };
        match self.ctx.provider.complete(request).await {
            Ok(response) => {
                let reply = response.text();
                next.append(Role::Assistant, response.message.parts().to_vec());
                self.thread = next;
                debug!(
                    conversation = %self.key,
                    model = %response.model,
                    turns = self.thread.len(),
                    "Generated reply"
                );
                format!("{notice}{reply}")
            }
            Err(err) => {
                warn!(conversation = %self.key, error = %err, "Generation failed");
                format!("{notice}{}", error_reply(&err.into()))
            }
        }
    }

    async fn execute(&mut self, command: Command) -> Result<String, AssistantError> {
        match command {
            Command::Help => Ok(commands::help_text(self.ctx.reminders_enabled())),
            Command::ConvoLen => Ok(self.convo_len()),
            Command::ResetThread => {
                self.reset_thread().await?;
                Ok(format!("Thread Reset. {}", self.convo_len()))
            }
            Command::ShowThread => Ok(self.thread.render()),
            Command::GptSettings => Ok(self.settings.display(self.thread.active_prompt_name())),
            Command::GptSet { key, value } => {
                self.settings.set(&key, &value, &self.ctx.catalog)?;
                Ok(self.settings.display(self.thread.active_prompt_name()))
            }
            Command::CurrentPrompt => Ok(self.thread.active_prompt_name().to_string()),
            Command::ChangePrompt(name) => self.change_prompt(&name).await,
            Command::ShowPrompts => Ok(self.ctx.registry.lock().await.listing()),
            Command::ListModels => Ok(self.ctx.catalog.listing()),
            Command::ModifyPrompts => {
                let registry = self.ctx.registry.lock().await;
                Ok(self.session.open(&registry))
            }
            Command::SaveThread => {
                let id = self.ctx.snapshots.save(self.thread.serialize()).await?;
                info!(conversation = %self.key, thread = %id, "Thread saved");
                Ok(format!("Saved thread as {id}"))
            }
            Command::ShowOldThreads => self.show_old_threads().await,
            Command::LoadThread(id) => self.load_thread(&id).await,
            Command::DeleteThread(id) => {
                self.ctx
                    .snapshots
                    .delete(&id)
                    .await
                    .map_err(|e| thread_error(e, &id))?;
                Ok(format!("Deleted thread {id}"))
            }
            Command::CurrentModel => Ok(format!("Current model: {}", self.settings.model())),
            Command::Swap => {
                let [first, second] = &self.ctx.hotswap;
                let target = if self.settings.model() == second.as_str() { first } else { second };
                self.settings.set_model(target, &self.ctx.catalog)?;
                Ok(format!("Set to: {}", self.settings.model()))
            }
            Command::AddAndSetPrompt { name, text, reset } => {
                self.add_and_set_prompt(&name, &text, reset).await
            }
            Command::RemindMe { task, amount, unit } => self.remind_me(task, amount, unit),
            Command::CancelReminder(id) => {
                let scheduler = self.scheduler()?;
                if scheduler.cancel(id) {
                    Ok(format!("Cancelled reminder {id}."))
                } else {
                    Err(AssistantError::not_found("reminder", id.to_string()))
                }
            }
        }
    }

    fn convo_len(&self) -> String {
        let rendered = self.thread.render();
        format!(
            "len:{} | tokens: ~{}",
            rendered.chars().count(),
            estimate_tokens(&rendered)
        )
    }

    /// Reset onto the conversation's prompt, or the sentinel if it is gone.
    async fn reset_thread(&mut self) -> Result<(), AssistantError> {
        let mut registry = self.ctx.registry.lock().await;
        if let Ok(text) = registry.get(self.thread.active_prompt_name()) {
            self.thread.reset(text);
            return Ok(());
        }
        warn!(
            conversation = %self.key,
            prompt = %self.thread.active_prompt_name(),
            "Active prompt vanished, resetting to '{EMPTY_PROMPT}'"
        );
        registry.reassign(self.thread.active_prompt_name(), EMPTY_PROMPT);
        let text = registry.get(EMPTY_PROMPT)?;
        self.thread.reset_to(EMPTY_PROMPT, text);
        Ok(())
    }

    async fn change_prompt(&mut self, name: &str) -> Result<String, AssistantError> {
        let mut registry = self.ctx.registry.lock().await;
        let text = match registry.get(name) {
            Ok(text) => text.to_string(),
            Err(err) => {
                let available: Vec<&str> = registry.names().collect();
                return Ok(format!(
                    "{}. Available prompts: {}",
                    error_reply(&err),
                    available.join(" ")
                ));
            }
        };
        registry.set_active(name)?;
        registry.reassign(self.thread.active_prompt_name(), name);
        self.thread.reset_to(name, &text);
        Ok(format!("New current prompt set to: {name}"))
    }

    async fn add_and_set_prompt(
        &mut self,
        name: &str,
        text: &str,
        reset: bool,
    ) -> Result<String, AssistantError> {
        let mut registry = self.ctx.registry.lock().await;
        if !registry.contains(name) {
            registry.add(name, text)?;
        }
        registry.set_active(name)?;
        registry.reassign(self.thread.active_prompt_name(), name);
        let prompt = registry.get(name)?;
        if reset {
            self.thread.reset_to(name, prompt);
        } else {
            self.thread.replace_system(name, prompt);
        }
        Ok(format!("Prompt '{name}' is now active."))
    }

    async fn show_old_threads(&self) -> Result<String, AssistantError> {
        let snapshots = self.ctx.snapshots.list().await?;
        if snapshots.is_empty() {
            return Ok("No saved threads.".to_string());
        }
        let separator = "~ ".repeat(30);
        Ok(snapshots
            .iter()
            .map(|s| format!("Thread id: {}\n{}{separator}\n", s.id, s.preview()))
            .collect())
    }

    async fn load_thread(&mut self, id: &str) -> Result<String, AssistantError> {
        let snapshot = self
            .ctx
            .snapshots
            .load(id)
            .await
            .map_err(|e| thread_error(e, id))?;
        let mut thread = ConversationThread::deserialize(snapshot)?;

        let mut registry = self.ctx.registry.lock().await;
        if !registry.contains(thread.active_prompt_name()) {
            thread.set_active_prompt_name(self.thread.active_prompt_name());
        }
        registry.reassign(self.thread.active_prompt_name(), thread.active_prompt_name());
        drop(registry);

        self.thread = thread;
        info!(conversation = %self.key, thread = %id, turns = self.thread.len(), "Thread loaded");
        Ok(format!("Loaded thread {id}"))
    }

    fn remind_me(&self, task: String, amount: f64, unit: ReminderUnit) -> Result<String, AssistantError> {
        let scheduler = self.scheduler()?;
        let delay = unit
            .delay(amount)
            .ok_or_else(|| AssistantError::usage("remind me, [task], [amount], [unit s|m|h|d]"))?;
        let reply = format!("Reminder set for '{task}' in {amount} {}.", unit.as_str());
        let id = scheduler.schedule(self.key.clone(), task, delay);
        Ok(format!("{reply} (id {id})"))
    }

    fn scheduler(&self) -> Result<&palaver_workflow::ReminderScheduler, AssistantError> {
        self.ctx
            .reminders
            .as_deref()
            .ok_or_else(|| AssistantError::State("Reminders are not enabled here.".into()))
    }
}

fn thread_error(err: StorageError, id: &str) -> AssistantError {
    match err {
        StorageError::NotFound(_) => AssistantError::not_found("thread", id),
        other => other.into(),
    }
}
