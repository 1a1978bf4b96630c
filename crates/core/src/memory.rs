//! Memory traits — previously stored context that can enrich new prompts.
//!
//! Two capabilities are kept apart on purpose:
//! - [`MemoryStore`]: append-only storage plus recency listing (always present)
//! - [`EmbeddingIndex`]: vector similarity search (optional — a deployment
//!   without an index falls back to recency)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::error::MemoryError;

/// How an entry was ranked when it was retrieved.
///
/// Attached only at retrieval time and never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RetrievalRank {
    /// Cosine similarity to the query embedding.
    Similarity(f32),
    /// 1-based position among the most recent entries.
    Recency(usize),
}

impl std::fmt::Display for RetrievalRank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Similarity(s) => write!(f, "similarity {s:.2}"),
            Self::Recency(r) => write!(f, "recency #{r}"),
        }
    }
}

/// A single memory entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// Unique ID for this memory
    pub id: String,

    /// The content of the memory
    pub content: String,

    /// Embedding vector; when present it always has the configured dimension
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,

    /// Free-form metadata (source run, task, tags)
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,

    /// When this memory was created
    pub created_at: DateTime<Utc>,

    /// Set by retrieval operations only
    #[serde(skip)]
    pub rank: Option<RetrievalRank>,
}

impl MemoryEntry {
    /// Create a new entry with an empty id (the store assigns one).
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            content: content.into(),
            embedding: None,
            metadata: serde_json::Map::new(),
            created_at: Utc::now(),
            rank: None,
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Append-only memory storage.
///
/// Implementations: in-memory (tests, ephemeral sessions), JSONL file.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// The backend name (e.g., "in_memory", "file").
    fn name(&self) -> &str;

    /// Append a new entry and return its id. Existing entries are never modified.
    async fn append(&self, entry: MemoryEntry) -> std::result::Result<String, MemoryError>;

    /// The `k` most recent entries, newest first.
    async fn recent(&self, k: usize) -> std::result::Result<Vec<MemoryEntry>, MemoryError>;

    /// Total number of stored entries.
    async fn count(&self) -> std::result::Result<usize, MemoryError>;
}

/// Vector similarity search over stored entries.
#[async_trait]
pub trait EmbeddingIndex: Send + Sync {
    /// The `k` entries most similar to `vector`, best first, each carrying a
    /// [`RetrievalRank::Similarity`].
    async fn search(
        &self,
        vector: &[f32],
        k: usize,
    ) -> std::result::Result<Vec<MemoryEntry>, MemoryError>;
}
