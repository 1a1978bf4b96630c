//! Rate-limit bucket state and its storage contract.
//!
//! Buckets are persisted outside the engine. The store offers compare-and-set
//! on a version counter so that two concurrent runs for the same user can never
//! both withdraw the last token.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Per-user token bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitBucket {
    /// Available tokens; never negative
    pub tokens: f64,

    /// Last time tokens were added; never moves backwards
    pub last_refill: DateTime<Utc>,

    /// Incremented on every successful write
    pub version: u64,
}

impl RateLimitBucket {
    /// A full bucket.
    pub fn full(capacity: f64, now: DateTime<Utc>) -> Self {
        Self {
            tokens: capacity,
            last_refill: now,
            version: 0,
        }
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateLimitDecision {
    pub allowed: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

impl RateLimitDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            retry_after_secs: None,
        }
    }

    pub fn deny(retry_after_secs: u64) -> Self {
        Self {
            allowed: false,
            retry_after_secs: Some(retry_after_secs),
        }
    }
}

/// External bucket storage.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Current bucket for `user_id`, `None` if the user has never been seen.
    async fn load(&self, user_id: &str) -> Result<Option<RateLimitBucket>, Error>;

    /// Write `bucket` only if the stored version still equals `expected_version`
    /// (`None` = no bucket stored yet). Returns whether the write happened.
    async fn compare_and_set(
        &self,
        user_id: &str,
        expected_version: Option<u64>,
        bucket: RateLimitBucket,
    ) -> Result<bool, Error>;
}
