//! CLI channel: interactive terminal-based chat.
//!
//! This is the simplest channel: reads from stdin, writes to stdout.
//! Used for `palaver chat` interactive mode. Every line is one utterance in
//! a single conversation.

use async_trait::async_trait;
use palaver_core::channel::{Channel, ChannelId, ChannelMessage};
use palaver_core::error::ChannelError;
use tokio::sync::mpsc;
use tokio::io::{self, AsyncBufReadExt, BufReader};

/// Chat id every terminal line is filed under.
pub const CLI_CHAT_ID: &str = "cli_session";

/// Interactive CLI channel for terminal-based chat.
pub struct CliChannel {
    id: ChannelId,
}

impl CliChannel {
    pub fn new() -> Self {
        Self {
            id: ChannelId("cli".into()),
        }
    }

    /// Lines that end the session instead of reaching the assistant.
    pub fn is_exit_command(line: &str) -> bool {
        matches!(line, "exit" | "quit" | "/exit" | "/quit" | ":q")
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    fn id(&self) -> &ChannelId {
        &self.id
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
        let (tx, rx) = mpsc::channel(32);
        let channel_id = self.id.clone();

        tokio::spawn(async move {
            let stdin = io::stdin();
            let reader = BufReader::new(stdin);
            let mut lines = reader.lines();

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim().to_string();
                        if line.is_empty() {
                            continue;
                        }

                        if CliChannel::is_exit_command(&line) {
                            break;
                        }

                        let mut msg =
                            ChannelMessage::text(channel_id.0.clone(), CLI_CHAT_ID, "local_user", line);
                        msg.sender_name = Some("User".into());

                        if tx.send(Ok(msg)).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF (Ctrl+D)
                    Err(e) => {
                        let _ = tx.send(Err(ChannelError::ConnectionLost(e.to_string()))).await;
                        break;
                    }
                }
            }
        });

        Ok(rx)
    }

    async fn send(&self, _chat_id: &str, content: &str) -> Result<(), ChannelError> {
        println!("{content}");
        Ok(())
    }

    fn is_allowed(&self, _sender_id: &str) -> bool {
        true // CLI is always allowed (local user)
    }
}
