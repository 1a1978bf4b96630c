//! File-based memory store — persistent JSON-lines storage.
//!
//! Each line is a JSON-encoded `MemoryEntry`. Entries are loaded into memory
//! on creation; `append` writes exactly one new line, so existing lines are
//! never rewritten.
//!
//! Storage location: `~/.swarmforge/memory/memories.jsonl`

use async_trait::async_trait;
use swarmforge_core::error::MemoryError;
use swarmforge_core::memory::{EmbeddingIndex, MemoryEntry, MemoryStore};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;
use crate::vector::{check_dimension, most_recent, vector_search};

/// A file-backed, append-only memory store using JSONL.
pub struct FileStore {
    path: PathBuf,
    entries: Arc<RwLock<Vec<MemoryEntry>>>,
    dimension: Option<usize>,
}

impl FileStore {
    /// Open a store at `path`.
    ///
    /// If the file exists, entries are loaded from it.
    /// If the file does not exist, starts empty (file created on first write).
    pub fn new(path: PathBuf) -> Self {
        let entries = Self::load_from_disk(&path, None);
        debug!(path = %path.display(), count = entries.len(), "File memory store loaded");
        Self {
            path,
            entries: Arc::new(RwLock::new(entries)),
            dimension: None,
        }
    }

    /// Open a store whose embeddings must have `dimension` components.
    ///
    /// Stored entries with a different dimension keep their content but lose
    /// the embedding (they stay reachable through recency).
    pub fn with_dimension(path: PathBuf, dimension: usize) -> Self {
        let entries = Self::load_from_disk(&path, Some(dimension));
        debug!(path = %path.display(), count = entries.len(), dimension, "File memory store loaded");
        Self {
            path,
            entries: Arc::new(RwLock::new(entries)),
            dimension: Some(dimension),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load entries from a JSONL file.
    fn load_from_disk(path: &Path, dimension: Option<usize>) -> Vec<MemoryEntry> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Vec::new(), // File doesn't exist yet
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<MemoryEntry>(line) {
                Ok(mut entry) => {
                    if let Err(e) = check_dimension(&entry, dimension) {
                        warn!(id = %entry.id, error = %e, "Dropping embedding of stored memory");
                        entry.embedding = None;
                    }
                    Some(entry)
                }
                Err(e) => {
                    warn!(error = %e, "Skipping corrupted memory entry");
                    None
                }
            })
            .collect()
    }

    /// Append one serialized entry to the file.
    fn write_line(&self, entry: &MemoryEntry) -> Result<(), MemoryError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                MemoryError::Storage(format!("Failed to create memory directory: {e}"))
            })?;
        }

        let mut line = serde_json::to_string(entry)
            .map_err(|e| MemoryError::Storage(format!("Failed to serialize memory entry: {e}")))?;
        line.push('\n');

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| MemoryError::Storage(format!("Failed to open memory file: {e}")))?;

        file.write_all(line.as_bytes())
            .map_err(|e| MemoryError::Storage(format!("Failed to write memory file: {e}")))
    }
}

#[async_trait]
impl MemoryStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn append(&self, mut entry: MemoryEntry) -> Result<String, MemoryError> {
        check_dimension(&entry, self.dimension)?;
        if entry.id.is_empty() {
            entry.id = Uuid::new_v4().to_string();
        }
        entry.rank = None;
        let id = entry.id.clone();

        // Hold the write lock across the file write so lines land in append order.
        let mut entries = self.entries.write().await;
        self.write_line(&entry)?;
        entries.push(entry);
        Ok(id)
    }

    async fn recent(&self, k: usize) -> Result<Vec<MemoryEntry>, MemoryError> {
        Ok(most_recent(&self.entries.read().await, k))
    }

    async fn count(&self) -> Result<usize, MemoryError> {
        Ok(self.entries.read().await.len())
    }
}

#[async_trait]
impl EmbeddingIndex for FileStore {
    async fn search(&self, vector: &[f32], k: usize) -> Result<Vec<MemoryEntry>, MemoryError> {
        if let Some(expected) = self.dimension {
            if vector.len() != expected {
                return Err(MemoryError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
        }
        Ok(vector_search(&self.entries.read().await, vector, k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn temp_path() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory").join("memories.jsonl");
        (dir, path)
    }

    #[tokio::test]
    async fn append_and_reload() {
        let (_dir, path) = temp_path();
        {
            let store = FileStore::new(path.clone());
            store
                .append(MemoryEntry::new("The user prefers Rust").with_embedding(vec![1.0, 0.0]))
                .await
                .unwrap();
            store.append(MemoryEntry::new("Deploys on Fridays are banned")).await.unwrap();
        }

        let reloaded = FileStore::new(path.clone());
        assert_eq!(reloaded.count().await.unwrap(), 2);
        let hits = reloaded.search(&[1.0, 0.0], 1).await.unwrap();
        assert_eq!(hits[0].content, "The user prefers Rust");

        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw.lines().count(), 2);
    }

    #[tokio::test]
    async fn append_never_rewrites_existing_lines() {
        let (_dir, path) = temp_path();
        let store = FileStore::new(path.clone());
        store.append(MemoryEntry::new("one")).await.unwrap();
        let first = std::fs::read_to_string(&path).unwrap();

        store.append(MemoryEntry::new("two")).await.unwrap();
        let second = std::fs::read_to_string(&path).unwrap();
        assert!(second.starts_with(&first));
    }

    #[tokio::test]
    async fn corrupted_lines_are_skipped() {
        let (_dir, path) = temp_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let good = serde_json::to_string(&MemoryEntry::new("valid")).unwrap();
        std::fs::write(&path, format!("{good}\nnot json at all\n\n")).unwrap();

        let store = FileStore::new(path);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn mismatched_embeddings_dropped_on_load() {
        let (_dir, path) = temp_path();
        {
            let store = FileStore::new(path.clone());
            store
                .append(MemoryEntry::new("old model").with_embedding(vec![1.0, 0.0]))
                .await
                .unwrap();
        }

        let store = FileStore::with_dimension(path, 3);
        assert_eq!(store.count().await.unwrap(), 1);
        assert!(store.search(&[1.0, 0.0, 0.0], 5).await.unwrap().is_empty());
        assert_eq!(store.recent(5).await.unwrap()[0].content, "old model");
    }

    #[tokio::test]
    async fn recent_uses_created_at() {
        let (_dir, path) = temp_path();
        let store = FileStore::new(path);
        let now = Utc::now();
        store
            .append(MemoryEntry::new("newest").with_created_at(now))
            .await
            .unwrap();
        store
            .append(MemoryEntry::new("oldest").with_created_at(now - Duration::hours(1)))
            .await
            .unwrap();

        let recent = store.recent(1).await.unwrap();
        assert_eq!(recent[0].content, "newest");
    }
}
