//! Thread-safe metrics collector — per-provider latency ring buffers.
//!
//! Created once by the embedding application and handed to the provider
//! gateway by `Arc`. Nothing here is global.

use crate::model::*;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

/// Collects provider attempt latencies over a bounded window.
pub struct MetricsCollector {
    /// Samples kept per provider.
    window: usize,
    providers: RwLock<HashMap<String, ProviderWindow>>,
}

#[derive(Debug, Default)]
struct ProviderWindow {
    samples: VecDeque<LatencySample>,
    total_calls: u64,
    total_failures: u64,
}

impl MetricsCollector {
    /// Create a collector keeping the last `window` samples per provider.
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            providers: RwLock::new(HashMap::new()),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    // A panicking writer leaves the map consistent, so poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, ProviderWindow>> {
        self.providers.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, ProviderWindow>> {
        self.providers.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Record one attempt against `provider`.
    pub fn record(&self, provider: &str, latency: Duration, success: bool) {
        let sample = LatencySample {
            latency_ms: latency.as_millis().min(u64::MAX as u128) as u64,
            success,
        };

        let mut providers = self.write();
        let entry = providers.entry(provider.to_string()).or_default();
        if entry.samples.len() == self.window {
            entry.samples.pop_front();
        }
        entry.samples.push_back(sample);
        entry.total_calls += 1;
        if !success {
            entry.total_failures += 1;
        }

        tracing::trace!(
            provider,
            latency_ms = sample.latency_ms,
            success,
            "Recorded provider latency"
        );
    }

    /// Stats for a single provider, if it has been seen.
    pub fn provider_stats(&self, provider: &str) -> Option<ProviderStats> {
        let providers = self.read();
        providers.get(provider).map(|w| {
            let samples: Vec<LatencySample> = w.samples.iter().copied().collect();
            ProviderStats::from_window(provider, w.total_calls, w.total_failures, &samples)
        })
    }

    /// Stats for every provider seen so far.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let providers = self.read();
        let mut stats: Vec<ProviderStats> = providers
            .iter()
            .map(|(id, w)| {
                let samples: Vec<LatencySample> = w.samples.iter().copied().collect();
                ProviderStats::from_window(id.as_str(), w.total_calls, w.total_failures, &samples)
            })
            .collect();
        stats.sort_by(|a, b| a.provider.cmp(&b.provider));

        MetricsSnapshot {
            taken_at: Utc::now(),
            providers: stats,
        }
    }

    /// Drop every recorded sample and counter.
    pub fn reset(&self) {
        self.write().clear();
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new(100)
    }
}
