//! The conversation core of Palaver.
//!
//! Every utterance that reaches the assistant goes through the same
//! dispatch:
//!
//! 1. **Edit session**: if the conversation has a prompt edit open, the
//!    utterance belongs to it
//! 2. **Conversation**: unprefixed text is appended to the thread and sent
//!    to the provider
//! 3. **Literal commands**: prefixed text is matched against the command
//!    table
//! 4. **Interpretation**: unknown commands are shown to the provider once;
//!    if it answers with a command, that command runs, and nothing further
//!
//! Each conversation is owned by one [`CommandRouter`]; the
//! [`ConversationHub`] gives every conversation its own worker so they never
//! block one another.

pub mod commands;
pub mod context;
pub mod edit_session;
pub mod hub;
pub mod registry;
pub mod router;
pub mod settings;
pub mod thread;
pub mod token;

#[cfg(test)]
mod test_helpers;

pub use commands::Command;
pub use context::AssistantContext;
pub use edit_session::{EditState, PromptEditSession};
pub use hub::{ConversationHub, Inbound};
pub use registry::{EMPTY_PROMPT, PromptRegistry};
pub use router::CommandRouter;
pub use settings::{GenerationSettings, ModelCatalog};
pub use thread::ConversationThread;
