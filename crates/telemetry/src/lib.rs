//! Provider latency metrics for SwarmForge.
//!
//! A [`MetricsCollector`] keeps a bounded ring buffer of attempt latencies per
//! provider and serves snapshots (count, failures, mean/p50/p95). It is an
//! explicitly owned instance with a `reset()` lifecycle, injected wherever
//! provider calls are made.

pub mod collector;
pub mod model;

pub use collector::MetricsCollector;
pub use model::{LatencySample, MetricsSnapshot, ProviderStats};
