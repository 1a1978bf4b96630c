//! Memory retrieval and prompt injection.
//!
//! `retrieve` ranks by vector similarity when the query can be embedded and an
//! index is attached, and falls back to the newest entries otherwise. The
//! fallback is a normal path, not an error. `inject` never fails: whatever
//! goes wrong, the caller gets its base prompt back.

use std::sync::Arc;
use swarmforge_core::error::MemoryError;
use swarmforge_core::memory::{EmbeddingIndex, MemoryEntry, MemoryStore};
use swarmforge_core::provider::Embedder;
use tracing::{debug, warn};

/// Heading of the injected context block.
pub const MEMORY_HEADER: &str = "## Relevant Memory";

pub struct MemoryRetriever {
    store: Arc<dyn MemoryStore>,
    index: Option<Arc<dyn EmbeddingIndex>>,
    embedder: Option<Arc<dyn Embedder>>,
    max_context_chars: usize,
}

impl MemoryRetriever {
    /// A recency-only retriever over `store`.
    pub fn new(store: Arc<dyn MemoryStore>) -> Self {
        Self {
            store,
            index: None,
            embedder: None,
            max_context_chars: 4000,
        }
    }

    pub fn with_index(mut self, index: Arc<dyn EmbeddingIndex>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Character limit of the injected block, header included.
    pub fn with_max_context_chars(mut self, max: usize) -> Self {
        self.max_context_chars = max;
        self
    }

    pub fn store(&self) -> &Arc<dyn MemoryStore> {
        &self.store
    }

    async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        match &self.embedder {
            Some(embedder) => embedder.embed(text).await,
            None => None,
        }
    }

    /// The `k` entries most relevant to `query`, best first.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<MemoryEntry>, MemoryError> {
        if k == 0 {
            return Ok(Vec::new());
        }

        if let Some(index) = &self.index {
            if let Some(vector) = self.embed(query).await {
                match index.search(&vector, k).await {
                    Ok(hits) if !hits.is_empty() => {
                        debug!(count = hits.len(), "Memory: similarity retrieval");
                        return Ok(hits);
                    }
                    Ok(_) => debug!("Memory: no embedded entries, using recency"),
                    Err(e) => warn!(error = %e, "Memory: index search failed, using recency"),
                }
            } else {
                debug!("Memory: query embedding unavailable, using recency");
            }
        }

        let recent = self.store.recent(k).await?;
        debug!(count = recent.len(), "Memory: recency retrieval");
        Ok(recent)
    }

    /// `base_prompt` followed by a labeled block of retrieved memories.
    ///
    /// Returns `base_prompt` unchanged when nothing is retrieved.
    pub async fn try_inject(&self, base_prompt: &str, query: &str, k: usize) -> Result<String, MemoryError> {
        let entries = self.retrieve(query, k).await?;
        match format_block(&entries, self.max_context_chars) {
            Some(block) => Ok(format!("{base_prompt}\n\n{block}")),
            None => Ok(base_prompt.to_string()),
        }
    }

    /// Like [`try_inject`](Self::try_inject), but any failure yields
    /// `base_prompt` unchanged.
    pub async fn inject(&self, base_prompt: &str, query: &str, k: usize) -> String {
        match self.try_inject(base_prompt, query, k).await {
            Ok(prompt) => prompt,
            Err(e) => {
                warn!(error = %e, "Memory injection failed, continuing without memory");
                base_prompt.to_string()
            }
        }
    }

    /// Store `content` as a new memory, embedded when possible.
    pub async fn remember(
        &self,
        content: &str,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Result<String, MemoryError> {
        let mut entry = MemoryEntry::new(content);
        entry.metadata = metadata;
        if let Some(vector) = self.embed(content).await {
            entry = entry.with_embedding(vector);
        }
        let id = self.store.append(entry).await?;
        debug!(id = %id, "Memory stored");
        Ok(id)
    }
}

/// Render entries as a bounded context block, `None` if nothing fits.
fn format_block(entries: &[MemoryEntry], max_chars: usize) -> Option<String> {
    if entries.is_empty() {
        return None;
    }

    let mut block = String::from(MEMORY_HEADER);
    let mut used = block.chars().count();
    let mut added = 0;

    for entry in entries {
        let label = match entry.rank {
            Some(rank) => format!("\n- ({rank}) "),
            None => "\n- ".to_string(),
        };
        let label_len = label.chars().count();
        let content = entry.content.trim();
        let content_len = content.chars().count();

        if used + label_len + content_len <= max_chars {
            block.push_str(&label);
            block.push_str(content);
            used += label_len + content_len;
            added += 1;
            continue;
        }

        // Squeeze a truncated copy of the first entry in; later entries are dropped.
        if added == 0 && used + label_len + 1 < max_chars {
            let room = max_chars - used - label_len - 1;
            block.push_str(&label);
            block.extend(content.chars().take(room));
            block.push('…');
            added += 1;
        }
        break;
    }

    (added > 0).then_some(block)
}
