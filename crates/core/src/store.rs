//! Storage traits: durable homes for prompts and saved threads.
//!
//! Two shapes of persistence are needed:
//! - the prompt registry is small and rewritten wholesale on every change,
//!   synchronously, so the trait is blocking;
//! - thread snapshots are independent blobs addressed by id and may be large,
//!   so that trait is async.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::error::StorageError;
use crate::message::{Message, render_transcript};

/// A durable copy of one thread's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadSnapshot {
    /// Opaque id derived from the creation time
    pub id: String,

    pub created_at: DateTime<Utc>,

    /// Name of the prompt that seeded the thread when it was saved
    pub prompt_name: String,

    pub history: Vec<Message>,
}

impl ThreadSnapshot {
    pub fn new(prompt_name: impl Into<String>, history: Vec<Message>) -> Self {
        let created_at = Utc::now();
        Self {
            id: Self::id_for(created_at),
            created_at,
            prompt_name: prompt_name.into(),
            history,
        }
    }

    /// `<unix seconds>.<microseconds>`, e.g. `1718035200.000042`.
    pub fn id_for(at: DateTime<Utc>) -> String {
        format!("{}.{:06}", at.timestamp(), at.timestamp_subsec_micros())
    }

    /// Transcript of the saved history.
    pub fn preview(&self) -> String {
        render_transcript(&self.history)
    }
}

/// Persistence for saved thread snapshots.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    fn name(&self) -> &str;

    /// Persist a snapshot and return the id it can be loaded by.
    ///
    /// If the snapshot's id is already taken the store picks a fresh one.
    async fn save(&self, snapshot: ThreadSnapshot) -> Result<String, StorageError>;

    /// All saved snapshots, oldest first.
    async fn list(&self) -> Result<Vec<ThreadSnapshot>, StorageError>;

    async fn load(&self, id: &str) -> Result<ThreadSnapshot, StorageError>;

    async fn delete(&self, id: &str) -> Result<(), StorageError>;
}

/// Persistence for the prompt registry's name → text mapping.
///
/// `save` must not return until the whole mapping is durable.
pub trait PromptStore: Send + Sync {
    fn load(&self) -> Result<BTreeMap<String, String>, StorageError>;

    fn save(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn id_is_derived_from_creation_time() {
        let at = Utc.timestamp_opt(1_700_000_000, 42_000).unwrap();
        assert_eq!(ThreadSnapshot::id_for(at), "1700000000.000042");
    }

    #[test]
    fn new_snapshot_uses_its_own_timestamp() {
        let snap = ThreadSnapshot::new("empty", vec![Message::system("")]);
        assert_eq!(snap.id, ThreadSnapshot::id_for(snap.created_at));
        assert_eq!(snap.preview(), "system:\n\n");
    }
}
