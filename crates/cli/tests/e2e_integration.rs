//! End-to-end integration tests for the Palaver assistant.
//!
//! These tests exercise the full pipeline from an inbound utterance to the
//! reply, including the on-disk prompt record, saved threads, channels, and
//! reminders.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use palaver_assistant::{AssistantContext, ConversationHub, EMPTY_PROMPT, Inbound, PromptRegistry};
use palaver_channels::{ChannelRegistry, DiscordChannel, DiscordConfig};
use palaver_config::AppConfig;
use palaver_core::channel::{Channel, ChannelMessage};
use palaver_core::error::ProviderError;
use palaver_core::message::{ConversationKey, Message, Role};
use palaver_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use palaver_memory::PromptFile;
use palaver_workflow::ReminderScheduler;

// ── Mock Provider ────────────────────────────────────────────────────────

/// A mock provider that returns scripted replies in sequence.
struct ScriptedProvider {
    replies: std::sync::Mutex<VecDeque<String>>,
    requests: std::sync::Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn new(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: std::sync::Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            requests: std::sync::Mutex::new(Vec::new()),
        })
    }

    fn last_request(&self) -> ProviderRequest {
        self.requests
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("provider was never called")
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let model = request.params.model.clone();
        self.requests.lock().unwrap().push(request);
        let text = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ProviderError::NotConfigured("script exhausted".into()))?;
        Ok(ProviderResponse {
            message: Message::assistant(text),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model,
        })
    }
}

fn config_in(dir: &tempfile::TempDir) -> AppConfig {
    AppConfig {
        data_dir: dir.path().to_path_buf(),
        ..AppConfig::default()
    }
}

fn key(chat: &str) -> ConversationKey {
    ConversationKey::new("e2e", chat)
}

async fn say(hub: &ConversationHub, chat: &str, text: &str) -> String {
    hub.dispatch(key(chat), Inbound::text(text)).await
}

// ── E2E: Conversation ────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_conversation_reaches_provider_with_active_prompt() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(&dir);
    let provider = ScriptedProvider::new(&["Hello! How can I help?"]);
    let ctx = AssistantContext::from_config(&config, provider.clone()).unwrap();
    let hub = ConversationHub::new(ctx);

    let reply = say(&hub, "a", "hi there").await;
    assert_eq!(reply, "Hello! How can I help?");

    let request = provider.last_request();
    assert_eq!(request.params.model, "gpt-4o");
    assert_eq!(request.messages.len(), 2);
    assert_eq!(request.messages[0].role(), Role::System);
    assert_eq!(request.messages[0].text(), "");
    assert_eq!(request.messages[1].text(), "hi there");

    let transcript = say(&hub, "a", "!show thread").await;
    assert!(transcript.contains("user:\nhi there"));
    assert!(transcript.contains("assistant:\nHello! How can I help?"));
}

#[tokio::test]
async fn e2e_provider_failure_leaves_thread_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new(&[]);
    let ctx = AssistantContext::from_config(&config_in(&dir), provider).unwrap();
    let hub = ConversationHub::new(ctx);

    let before = say(&hub, "a", "!convo len").await;
    let reply = say(&hub, "a", "are you there?").await;
    assert!(reply.starts_with("Sorry"));
    assert_eq!(say(&hub, "a", "!convo len").await, before);
}

// ── E2E: Prompt registry on disk ─────────────────────────────────────────

#[tokio::test]
async fn e2e_prompt_edits_persist_to_record_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(&dir);
    let ctx = AssistantContext::from_config(&config, ScriptedProvider::new(&[])).unwrap();
    let hub = ConversationHub::new(ctx);

    let listing = say(&hub, "a", "!modify prompts").await;
    assert!(listing.contains("Name: empty"));
    say(&hub, "a", "!add").await;
    let reply = say(&hub, "a", "!poet<SEP>Answer in verse.\nKeep it short.").await;
    assert_eq!(reply, "Added 'poet' with prompt 'Answer in verse.\nKeep it short.'");

    say(&hub, "a", "!modify prompts").await;
    say(&hub, "a", "!changename").await;
    say(&hub, "a", "!poet").await;
    assert_eq!(say(&hub, "a", "!bard").await, "Changed 'poet' to 'bard'");

    // A fresh registry over the same file sees the edits.
    let reopened = PromptRegistry::open(Arc::new(PromptFile::new(config.prompts_file()))).unwrap();
    assert!(!reopened.contains("poet"));
    assert_eq!(reopened.get("bard").unwrap(), "Answer in verse.\nKeep it short.");
    assert_eq!(reopened.get(EMPTY_PROMPT).unwrap(), "");
}

#[tokio::test]
async fn e2e_protected_prompt_survives_edit_attempts() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(&dir);
    let ctx = AssistantContext::from_config(&config, ScriptedProvider::new(&[])).unwrap();
    let hub = ConversationHub::new(ctx);

    say(&hub, "a", "!modify prompts").await;
    say(&hub, "a", "!delete").await;
    let reply = say(&hub, "a", "!empty").await;
    assert!(reply.starts_with("Refused:"));

    let reopened = PromptRegistry::open(Arc::new(PromptFile::new(config.prompts_file()))).unwrap();
    assert!(reopened.contains(EMPTY_PROMPT));
}

#[tokio::test]
async fn e2e_prompt_change_resets_thread_with_new_system_text() {
    let dir = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new(&["Arr!", "Yo ho!"]);
    let ctx = AssistantContext::from_config(&config_in(&dir), provider.clone()).unwrap();
    let hub = ConversationHub::new(ctx);

    say(&hub, "a", "hello").await;
    say(&hub, "a", "!_add_and_set_prompt<SEP>pirate<SEP>Talk like a pirate.<SEP>true").await;
    assert_eq!(say(&hub, "a", "!current prompt").await, "pirate");

    say(&hub, "a", "ahoy").await;
    let request = provider.last_request();
    assert_eq!(request.messages.len(), 2, "thread should have been reset");
    assert_eq!(request.messages[0].text(), "Talk like a pirate.");
}

// ── E2E: Saved threads ───────────────────────────────────────────────────

#[tokio::test]
async fn e2e_saved_thread_loads_in_another_process() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(&dir);

    let id = {
        let ctx = AssistantContext::from_config(&config, ScriptedProvider::new(&["Paris."])).unwrap();
        let hub = ConversationHub::new(ctx);
        say(&hub, "a", "capital of France?").await;
        let reply = say(&hub, "a", "!save thread").await;
        hub.shutdown().await;
        reply.strip_prefix("Saved thread as ").unwrap().to_string()
    };
    assert!(config.threads_dir().exists());

    let provider = ScriptedProvider::new(&["About 2 million."]);
    let ctx = AssistantContext::from_config(&config, provider.clone()).unwrap();
    let hub = ConversationHub::new(ctx);

    let listing = say(&hub, "b", "!show old threads").await;
    assert!(listing.contains(&format!("Thread id: {id}")));
    assert!(listing.contains("Paris."));

    assert_eq!(say(&hub, "b", &format!("!load thread, {id}")).await, format!("Loaded thread {id}"));
    say(&hub, "b", "and its population?").await;
    let request = provider.last_request();
    assert_eq!(request.messages.len(), 4);
    assert_eq!(request.messages[1].text(), "capital of France?");

    assert_eq!(say(&hub, "b", &format!("!delete thread, {id}")).await, format!("Deleted thread {id}"));
    assert_eq!(say(&hub, "b", "!show old threads").await, "No saved threads.");
}

// ── E2E: Channels ────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_discord_message_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = AssistantContext::from_config(&config_in(&dir), ScriptedProvider::new(&["pong"])).unwrap();
    let hub = ConversationHub::new(ctx);

    let discord = Arc::new(DiscordChannel::new(DiscordConfig {
        bot_token: "test-token".into(),
        allowed_users: vec!["*".into()],
        channel_filter: vec![],
    }));
    let mut channels = ChannelRegistry::new();
    channels.register(discord.clone() as Arc<dyn Channel>);
    let mut inbound = channels.start_all().await.unwrap();

    discord
        .inject_message(ChannelMessage::text("discord", "general", "user-1", "ping"))
        .await
        .unwrap();

    let (channel_name, msg) = inbound.recv().await.unwrap();
    let msg = msg.unwrap();
    assert_eq!(channel_name, "discord");

    let reply = hub.dispatch(msg.conversation_key(), Inbound::from(&msg)).await;
    channels.send_to(&channel_name, &msg.chat_id, &reply).await.unwrap();

    assert_eq!(discord.sent().await, vec![("general".to_string(), "pong".to_string())]);
}

// ── E2E: Reminders ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn e2e_reminder_fires_for_its_conversation() {
    let dir = tempfile::tempdir().unwrap();
    let (scheduler, mut fired) = ReminderScheduler::new();
    let ctx = AssistantContext::from_config(&config_in(&dir), ScriptedProvider::new(&[]))
        .unwrap()
        .with_reminders(Arc::new(scheduler));
    let hub = ConversationHub::new(ctx);

    let reply = say(&hub, "a", "!remind me, drink water, 2, s").await;
    assert!(reply.starts_with("Reminder set for 'drink water' in 2 s."));

    let reminder = tokio::time::timeout(Duration::from_secs(5), fired.recv())
        .await
        .expect("reminder should fire")
        .unwrap();
    assert_eq!(reminder.target, key("a"));
    assert_eq!(reminder.message(), "REMINDER: drink water");
}

#[tokio::test]
async fn e2e_reminders_disabled_without_scheduler() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = AssistantContext::from_config(&config_in(&dir), ScriptedProvider::new(&[])).unwrap();
    let hub = ConversationHub::new(ctx);

    assert_eq!(say(&hub, "a", "!remind me, stretch, 5, m").await, "Reminders are not enabled here.");
    assert!(!say(&hub, "a", "!help").await.contains("remind me"));
}

// ── E2E: Config ──────────────────────────────────────────────────────────

#[test]
fn e2e_config_defaults_and_toml() {
    let config = AppConfig::default();
    assert_eq!(config.command_prefix, "!");
    assert_eq!(config.initial_prompt, EMPTY_PROMPT);
    assert!(config.model(&config.generation.model).is_some());

    let toml = AppConfig::default_toml();
    assert!(toml.contains("command_prefix"));
    assert!(toml.contains("gpt-4o"));
}
