//! File-based thread snapshot store.
//!
//! Each snapshot is one JSON file named `<id>.json` inside the threads
//! directory. Nothing is cached: the directory is the source of truth, so
//! several processes can share it.
//!
//! Storage location: `~/.palaver/data/threads/`

use async_trait::async_trait;
use chrono::Duration;
use palaver_core::error::StorageError;
use palaver_core::store::{SnapshotStore, ThreadSnapshot};
use std::path::PathBuf;
use tracing::{debug, warn};

pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Ids are timestamps; anything that could escape the directory is
    /// treated as unknown.
    fn path_for(&self, id: &str) -> Result<PathBuf, StorageError> {
        if id.is_empty() || id.contains(['/', '\\']) || id.contains("..") {
            return Err(StorageError::NotFound(format!("thread '{id}'")));
        }
        Ok(self.dir.join(format!("{id}.json")))
    }

    async fn read(&self, path: &PathBuf) -> Result<ThreadSnapshot, StorageError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| StorageError::Io(format!("Failed to read {}: {e}", path.display())))?;
        serde_json::from_str(&content)
            .map_err(|e| StorageError::Corrupt(format!("{}: {e}", path.display())))
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn save(&self, mut snapshot: ThreadSnapshot) -> Result<String, StorageError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StorageError::Io(format!("Failed to create threads directory: {e}")))?;

        // Two saves within the same microsecond must not overwrite each other
        let mut path = self.path_for(&snapshot.id)?;
        let mut bump = 0;
        while tokio::fs::try_exists(&path).await.unwrap_or(false) {
            bump += 1;
            snapshot.id =
                ThreadSnapshot::id_for(snapshot.created_at + Duration::microseconds(bump));
            path = self.path_for(&snapshot.id)?;
        }

        let json = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| StorageError::Io(format!("Failed to serialize thread: {e}")))?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| StorageError::Io(format!("Failed to write thread: {e}")))?;

        debug!(id = %snapshot.id, messages = snapshot.history.len(), "Thread snapshot saved");
        Ok(snapshot.id)
    }

    async fn list(&self) -> Result<Vec<ThreadSnapshot>, StorageError> {
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::Io(format!("Failed to list threads: {e}"))),
        };

        let mut snapshots = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| StorageError::Io(format!("Failed to list threads: {e}")))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match self.read(&path).await {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(e) => warn!(error = %e, "Skipping unreadable thread snapshot"),
            }
        }

        snapshots.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(snapshots)
    }

    async fn load(&self, id: &str) -> Result<ThreadSnapshot, StorageError> {
        let path = self.path_for(id)?;
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(format!("thread '{id}'")));
        }
        self.read(&path).await
    }

    async fn delete(&self, id: &str) -> Result<(), StorageError> {
        let path = self.path_for(id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(id, "Thread snapshot deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(format!("thread '{id}'")))
            }
            Err(e) => Err(StorageError::Io(format!("Failed to delete thread: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use palaver_core::message::Message;

    fn snapshot(text: &str) -> ThreadSnapshot {
        ThreadSnapshot::new("empty", vec![Message::system(""), Message::user(text)])
    }

    #[tokio::test]
    async fn save_and_load_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let id = {
            let store = FileSnapshotStore::new(dir.path());
            store.save(snapshot("remember me")).await.unwrap()
        };

        let reopened = FileSnapshotStore::new(dir.path());
        let loaded = reopened.load(&id).await.unwrap();
        assert_eq!(loaded.id, id);
        assert_eq!(loaded.history.len(), 2);
        assert_eq!(loaded.history[1].text(), "remember me");
        assert!(dir.path().join(format!("{id}.json")).exists());
    }

    #[tokio::test]
    async fn identical_ids_get_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path());
        let first = snapshot("one");
        let mut second = snapshot("two");
        second.id = first.id.clone();
        second.created_at = first.created_at;

        let a = store.save(first).await.unwrap();
        let b = store.save(second).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(store.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn list_is_oldest_first_and_skips_junk() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path());

        let mut older = snapshot("older");
        older.created_at -= Duration::seconds(60);
        older.id = ThreadSnapshot::id_for(older.created_at);
        store.save(snapshot("newer")).await.unwrap();
        store.save(older).await.unwrap();
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].history[1].text(), "older");
        assert_eq!(listed[1].history[1].text(), "newer");
    }

    #[tokio::test]
    async fn list_of_missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("never-created"));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path());

        assert!(matches!(
            store.load("123.456").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            store.delete("123.456").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            store.load("../etc/passwd").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn delete_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path());
        let id = store.save(snapshot("bye")).await.unwrap();

        store.delete(&id).await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
        assert!(store.load(&id).await.is_err());
    }
}
