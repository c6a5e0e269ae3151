//! # Palaver Core
//!
//! Domain types, traits, and error definitions for the Palaver personal
//! assistant. This crate has **no framework dependencies**; it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (generation backend, chat platform, storage)
//! is a trait here. Implementations live in their respective crates, which
//! keeps the routing core testable with scripted stand-ins.

pub mod error;
pub mod message;
pub mod provider;
pub mod channel;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use error::{AssistantError, Error, ProviderError, Result, StorageError};
pub use message::{ContentPart, ConversationKey, Message, Role, render_transcript};
pub use provider::{GenerationParams, Provider, ProviderRequest, ProviderResponse, Usage};
pub use channel::{Attachment, AttachmentKind, Channel, ChannelId, ChannelMessage};
pub use store::{PromptStore, SnapshotStore, ThreadSnapshot};
