//! Storage implementations for Palaver: the prompt registry record and
//! saved thread snapshots.

pub mod file_snapshots;
pub mod in_memory;
pub mod prompt_file;

pub use file_snapshots::FileSnapshotStore;
pub use in_memory::{InMemoryPromptStore, InMemorySnapshotStore};
pub use prompt_file::{PromptFile, SEP};
