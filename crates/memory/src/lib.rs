//! Memory stores and retrieval for SwarmForge.
//!
//! Stores are append-only. The [`MemoryRetriever`] ranks stored entries by
//! vector similarity when it can embed the query and falls back to recency
//! when it can't.

pub mod file_backend;
pub mod in_memory;
pub mod noop;
pub mod retriever;
pub mod vector;

pub use file_backend::FileStore;
pub use in_memory::InMemoryStore;
pub use noop::NoopMemory;
pub use retriever::{MemoryRetriever, MEMORY_HEADER};
pub use vector::{cosine_similarity, most_recent, vector_search};
