//! In-memory store — useful for testing and ephemeral sessions.

use async_trait::async_trait;
use swarmforge_core::error::MemoryError;
use swarmforge_core::memory::{EmbeddingIndex, MemoryEntry, MemoryStore};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;
use crate::vector::{check_dimension, most_recent, vector_search};

/// An in-memory store that keeps memories in a Vec.
pub struct InMemoryStore {
    entries: Arc<RwLock<Vec<MemoryEntry>>>,
    dimension: Option<usize>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
            dimension: None,
        }
    }

    /// Reject embeddings that don't have exactly `dimension` components.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = Some(dimension);
        self
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn append(&self, mut entry: MemoryEntry) -> Result<String, MemoryError> {
        check_dimension(&entry, self.dimension)?;
        if entry.id.is_empty() {
            entry.id = Uuid::new_v4().to_string();
        }
        entry.rank = None;
        let id = entry.id.clone();
        self.entries.write().await.push(entry);
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
impl EmbeddingIndex for InMemoryStore {
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
