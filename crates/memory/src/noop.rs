//! No-op memory store — disables memory entirely.

use async_trait::async_trait;
use swarmforge_core::error::MemoryError;
use swarmforge_core::memory::{MemoryEntry, MemoryStore};

/// A store that keeps nothing. Retrieval always comes back empty, so
/// prompts pass through unchanged.
pub struct NoopMemory;

#[async_trait]
impl MemoryStore for NoopMemory {
    fn name(&self) -> &str {
        "none"
    }

    async fn append(&self, _entry: MemoryEntry) -> Result<String, MemoryError> {
        Ok(String::new())
    }

    async fn recent(&self, _k: usize) -> Result<Vec<MemoryEntry>, MemoryError> {
        Ok(Vec::new())
    }

    async fn count(&self) -> Result<usize, MemoryError> {
        Ok(0)
    }
}
