//! File-backed prompt registry record.
//!
//! One prompt per line, `name<SEP>text`. Backslashes and newlines inside a
//! prompt are escaped (`\\` and `\n`) so every record stays on one line.
//!
//! The whole mapping is rewritten on every save: the new content goes to a
//! sibling temp file which is then renamed over the record, so a reader never
//! observes a half-written file.
//!
//! Storage location: `~/.palaver/data/prompts.txt`

use palaver_core::error::StorageError;
use palaver_core::store::PromptStore;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Field separator between a prompt's name and its text.
pub const SEP: &str = "<SEP>";

pub struct PromptFile {
    path: PathBuf,
}

impl PromptFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse(content: &str) -> BTreeMap<String, String> {
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match line.split_once(SEP) {
                Some((name, text)) => Some((name.to_string(), unescape(text))),
                None => {
                    warn!(line, "Skipping malformed prompt record");
                    None
                }
            })
            .collect()
    }

    fn render(entries: &BTreeMap<String, String>) -> String {
        let mut content = String::new();
        for (name, text) in entries {
            content.push_str(name);
            content.push_str(SEP);
            content.push_str(&escape(text));
            content.push('\n');
        }
        content
    }
}

impl PromptStore for PromptFile {
    /// A missing file is an empty registry.
    fn load(&self) -> Result<BTreeMap<String, String>, StorageError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                return Err(StorageError::Io(format!(
                    "Failed to read {}: {e}",
                    self.path.display()
                )));
            }
        };

        let entries = Self::parse(&content);
        debug!(path = %self.path.display(), count = entries.len(), "Prompt record loaded");
        Ok(entries)
    }

    fn save(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::Io(format!("Failed to create prompt directory: {e}"))
            })?;
        }

        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, Self::render(entries))
            .map_err(|e| StorageError::Io(format!("Failed to write prompt record: {e}")))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| StorageError::Io(format!("Failed to replace prompt record: {e}")))?;

        debug!(path = %self.path.display(), count = entries.len(), "Prompt record flushed");
        Ok(())
    }
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('\n', "\\n")
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = PromptFile::new(dir.path().join("prompts.txt"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn save_then_load_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("prompts.txt");

        {
            let store = PromptFile::new(&path);
            store
                .save(&entries(&[("empty", ""), ("pirate", "Talk like a pirate.")]))
                .unwrap();
        }

        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw, "empty<SEP>\npirate<SEP>Talk like a pirate.\n");

        let reopened = PromptFile::new(&path);
        let loaded = reopened.load().unwrap();
        assert_eq!(loaded.get("pirate").map(String::as_str), Some("Talk like a pirate."));
        assert_eq!(loaded.get("empty").map(String::as_str), Some(""));
    }

    #[test]
    fn multiline_prompts_stay_on_one_line() {
        let dir = tempfile::tempdir().unwrap();
        let store = PromptFile::new(dir.path().join("prompts.txt"));
        let text = "line one\nline two with a \\ backslash\\n literal";
        store.save(&entries(&[("multi", text)])).unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(raw.lines().count(), 1);
        assert_eq!(store.load().unwrap()["multi"], text);
    }

    #[test]
    fn text_may_contain_the_separator() {
        let dir = tempfile::tempdir().unwrap();
        let store = PromptFile::new(dir.path().join("prompts.txt"));
        store.save(&entries(&[("meta", "use <SEP> between fields")])).unwrap();
        assert_eq!(store.load().unwrap()["meta"], "use <SEP> between fields");
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompts.txt");
        std::fs::write(&path, "good<SEP>text\nno separator here\n\n").unwrap();

        let loaded = PromptFile::new(&path).load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded["good"], "text");
    }

    #[test]
    fn save_rewrites_wholesale() {
        let dir = tempfile::tempdir().unwrap();
        let store = PromptFile::new(dir.path().join("prompts.txt"));
        store.save(&entries(&[("a", "1"), ("b", "2")])).unwrap();
        store.save(&entries(&[("b", "2")])).unwrap();

        let loaded = store.load().unwrap();
        assert!(!loaded.contains_key("a"));
        assert!(!dir.path().join("prompts.tmp").exists());
    }
}
