//! # SwarmForge Core
//!
//! Domain types, collaborator traits, and error definitions for the SwarmForge
//! agent orchestration engine. This crate has **no framework dependencies** —
//! it defines the model that every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (LLM vendors, credential storage, rate-limit
//! persistence, memory index, run persistence) is a trait here. Implementations
//! live in their respective crates or in the embedding application. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod message;
pub mod provider;
pub mod credentials;
pub mod memory;
pub mod agent;
pub mod swarm;
pub mod review;
pub mod ratelimit;
pub mod sink;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use message::{Message, Role};
pub use provider::{Completion, CompletionOptions, Embedder, Provider, ProviderRequest, ProviderResponse};
pub use credentials::{CredentialStore, Secret};
pub use memory::{EmbeddingIndex, MemoryEntry, MemoryStore, RetrievalRank};
pub use agent::{Agent, AgentRole, SpecialistCategory};
pub use swarm::{FailureReason, RunStatus, SwarmMessage, SwarmRequest, SwarmRun, FAILURE_SENTINEL};
pub use review::{GateDecision, Issue, IterationReport, Severity, SpecialistReport};
pub use ratelimit::{RateLimitBucket, RateLimitDecision, RateLimitStore};
pub use sink::{PersistenceSink, spawn_record};
