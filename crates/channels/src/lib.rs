//! Chat channel implementations for Palaver.
//!
//! Each channel connects to a chat platform and relays messages to/from
//! the assistant. Channels are trait-based and platform-agnostic.
//!
//! Available channels:
//! - **CLI**: Interactive terminal chat (stdin/stdout)
//! - **Discord**: Discord Bot API (stub, needs serenity in production)
//! - **Registry**: Central channel manager and message router

pub mod cli;
pub mod discord;
pub mod registry;

pub use cli::{CLI_CHAT_ID, CliChannel};
pub use discord::{DISCORD_MESSAGE_LIMIT, DiscordChannel, DiscordConfig, split_message};
pub use registry::ChannelRegistry;
