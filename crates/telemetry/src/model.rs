//! Data model for provider latency samples and metrics snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Sample ────────────────────────────────────────────────────────────────

/// One provider attempt as seen by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencySample {
    /// Wall-clock latency in milliseconds.
    pub latency_ms: u64,
    /// Whether the attempt produced a usable response.
    pub success: bool,
}

// ── Per-provider stats ────────────────────────────────────────────────────

/// Aggregated view of one provider's recent attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderStats {
    pub provider: String,
    /// Attempts recorded since creation or the last reset.
    pub total_calls: u64,
    /// Failed attempts recorded since creation or the last reset.
    pub total_failures: u64,
    /// Samples currently held in the window.
    pub window_len: usize,
    pub mean_latency_ms: f64,
    pub p50_latency_ms: u64,
    pub p95_latency_ms: u64,
    /// Failures / samples over the window.
    pub window_error_rate: f64,
}

impl ProviderStats {
    /// Build stats from the samples currently in a window.
    pub fn from_window(
        provider: impl Into<String>,
        total_calls: u64,
        total_failures: u64,
        samples: &[LatencySample],
    ) -> Self {
        let mut latencies: Vec<u64> = samples.iter().map(|s| s.latency_ms).collect();
        latencies.sort_unstable();

        let window_len = latencies.len();
        let mean_latency_ms = if window_len == 0 {
            0.0
        } else {
            latencies.iter().sum::<u64>() as f64 / window_len as f64
        };
        let failures = samples.iter().filter(|s| !s.success).count();

        Self {
            provider: provider.into(),
            total_calls,
            total_failures,
            window_len,
            mean_latency_ms,
            p50_latency_ms: percentile(&latencies, 50),
            p95_latency_ms: percentile(&latencies, 95),
            window_error_rate: if window_len == 0 {
                0.0
            } else {
                failures as f64 / window_len as f64
            },
        }
    }
}

/// Nearest-rank percentile over a sorted slice; 0 when empty.
fn percentile(sorted: &[u64], pct: usize) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let rank = (pct * sorted.len()).div_ceil(100).max(1);
    sorted[rank.min(sorted.len()) - 1]
}

// ── Snapshot ──────────────────────────────────────────────────────────────

/// Point-in-time view of every provider the collector has seen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub taken_at: DateTime<Utc>,
    /// Sorted by provider id.
    pub providers: Vec<ProviderStats>,
}

impl MetricsSnapshot {
    pub fn provider(&self, id: &str) -> Option<&ProviderStats> {
        self.providers.iter().find(|p| p.provider == id)
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(ms: u64) -> LatencySample {
        LatencySample { latency_ms: ms, success: true }
    }

    #[test]
    fn percentiles_nearest_rank() {
        let sorted: Vec<u64> = (1..=100).collect();
        assert_eq!(percentile(&sorted, 50), 50);
        assert_eq!(percentile(&sorted, 95), 95);
        assert_eq!(percentile(&[7], 95), 7);
        assert_eq!(percentile(&[], 50), 0);
    }

    #[test]
    fn stats_from_window() {
        let samples = vec![
            ok(100),
            ok(300),
            LatencySample { latency_ms: 200, success: false },
        ];
        let stats = ProviderStats::from_window("openai", 10, 4, &samples);
        assert_eq!(stats.window_len, 3);
        assert!((stats.mean_latency_ms - 200.0).abs() < 1e-9);
        assert_eq!(stats.p50_latency_ms, 200);
        assert_eq!(stats.p95_latency_ms, 300);
        assert!((stats.window_error_rate - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats.total_calls, 10);
    }

    #[test]
    fn empty_window_is_zeroed() {
        let stats = ProviderStats::from_window("idle", 0, 0, &[]);
        assert_eq!(stats.p95_latency_ms, 0);
        assert_eq!(stats.window_error_rate, 0.0);
    }
}
