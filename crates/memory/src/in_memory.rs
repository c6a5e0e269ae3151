//! In-memory stores: useful for testing and ephemeral sessions.

use async_trait::async_trait;
use chrono::Duration;
use palaver_core::error::StorageError;
use palaver_core::store::{PromptStore, SnapshotStore, ThreadSnapshot};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;

/// Snapshots kept in a map keyed by id.
pub struct InMemorySnapshotStore {
    snapshots: Arc<RwLock<BTreeMap<String, ThreadSnapshot>>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self {
            snapshots: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }
}

impl Default for InMemorySnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn save(&self, mut snapshot: ThreadSnapshot) -> Result<String, StorageError> {
        let mut snapshots = self.snapshots.write().await;
        let mut bump = 0;
        while snapshots.contains_key(&snapshot.id) {
            bump += 1;
            snapshot.id =
                ThreadSnapshot::id_for(snapshot.created_at + Duration::microseconds(bump));
        }
        let id = snapshot.id.clone();
        snapshots.insert(id.clone(), snapshot);
        Ok(id)
    }

    async fn list(&self) -> Result<Vec<ThreadSnapshot>, StorageError> {
        let mut all: Vec<ThreadSnapshot> = self.snapshots.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(all)
    }

    async fn load(&self, id: &str) -> Result<ThreadSnapshot, StorageError> {
        self.snapshots
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("thread '{id}'")))
    }

    async fn delete(&self, id: &str) -> Result<(), StorageError> {
        self.snapshots
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(format!("thread '{id}'")))
    }
}

/// Prompt mapping held in memory.
///
/// Writes can be made to fail on demand, which is how callers exercise their
/// behavior when a flush is rejected.
#[derive(Default)]
pub struct InMemoryPromptStore {
    entries: Mutex<BTreeMap<String, String>>,
    fail_writes: AtomicBool,
}

impl InMemoryPromptStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: BTreeMap<String, String>) -> Self {
        Self {
            entries: Mutex::new(entries),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Make every following `save` fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// What was last successfully saved.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.entries
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }
}

impl PromptStore for InMemoryPromptStore {
    fn load(&self) -> Result<BTreeMap<String, String>, StorageError> {
        self.entries
            .lock()
            .map(|e| e.clone())
            .map_err(|e| StorageError::Io(e.to_string()))
    }

    fn save(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Io("write rejected".into()));
        }
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Io(e.to_string()))?;
        *guard = entries.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use palaver_core::message::Message;

    #[tokio::test]
    async fn snapshot_store_lifecycle() {
        let store = InMemorySnapshotStore::new();
        let id = store
            .save(ThreadSnapshot::new("empty", vec![Message::system("")]))
            .await
            .unwrap();

        assert_eq!(store.list().await.unwrap().len(), 1);
        assert_eq!(store.load(&id).await.unwrap().prompt_name, "empty");

        store.delete(&id).await.unwrap();
        assert!(matches!(store.load(&id).await, Err(StorageError::NotFound(_))));
        assert!(store.delete(&id).await.is_err());
    }

    #[tokio::test]
    async fn colliding_ids_are_bumped() {
        let store = InMemorySnapshotStore::new();
        let snap = ThreadSnapshot::new("empty", vec![]);
        let a = store.save(snap.clone()).await.unwrap();
        let b = store.save(snap).await.unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn prompt_store_write_failure_keeps_last_good_state() {
        let store = InMemoryPromptStore::new();
        let mut entries = BTreeMap::new();
        entries.insert("empty".to_string(), String::new());
        store.save(&entries).unwrap();

        store.set_fail_writes(true);
        entries.insert("new".to_string(), "text".to_string());
        assert!(store.save(&entries).is_err());
        assert!(!store.snapshot().contains_key("new"));

        store.set_fail_writes(false);
        store.save(&entries).unwrap();
        assert!(store.load().unwrap().contains_key("new"));
    }
}
