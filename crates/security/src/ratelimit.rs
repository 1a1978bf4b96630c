//! Per-user token-bucket admission control.
//!
//! Every swarm run withdraws one token before any provider call is made. The
//! withdrawal is a compare-and-set against the bucket's version, so two
//! concurrent runs for the same user can never both take the last token.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use swarmforge_config::RateLimitConfig;
use swarmforge_core::error::Error;
use swarmforge_core::ratelimit::{RateLimitBucket, RateLimitDecision, RateLimitStore};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Attempts before giving up on a contended bucket.
const MAX_CAS_ATTEMPTS: usize = 8;

/// Errors from the rate limiter itself (never a denial).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RateLimitError {
    #[error("rate limit store failed: {0}")]
    Store(String),

    #[error("bucket for user '{user_id}' still contended after {attempts} attempts")]
    Contention { user_id: String, attempts: usize },
}

impl From<RateLimitError> for Error {
    fn from(e: RateLimitError) -> Self {
        Error::RateLimitStore(e.to_string())
    }
}

/// Token-bucket limiter over an external [`RateLimitStore`].
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    capacity: f64,
    refill_per_second: f64,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, capacity: u32, refill_per_second: f64) -> Self {
        Self {
            store,
            capacity: f64::from(capacity.max(1)),
            refill_per_second: refill_per_second.max(f64::MIN_POSITIVE),
        }
    }

    pub fn from_config(config: &RateLimitConfig, store: Arc<dyn RateLimitStore>) -> Self {
        Self::new(store, config.capacity, config.refill_per_second)
    }

    /// Bucket state at `now` without writing anything.
    ///
    /// Tokens never exceed capacity, and a clock that moved backwards adds
    /// nothing and leaves `last_refill` where it was.
    pub fn refill(&self, bucket: &RateLimitBucket, now: DateTime<Utc>) -> RateLimitBucket {
        let elapsed_secs = (now - bucket.last_refill).num_milliseconds().max(0) as f64 / 1000.0;
        RateLimitBucket {
            tokens: (bucket.tokens + elapsed_secs * self.refill_per_second).clamp(0.0, self.capacity),
            last_refill: bucket.last_refill.max(now),
            version: bucket.version,
        }
    }

    /// Seconds until one whole token is available.
    fn retry_after(&self, tokens: f64) -> u64 {
        let deficit = (1.0 - tokens).max(0.0);
        ((deficit / self.refill_per_second).ceil() as u64).max(1)
    }

    /// Try to withdraw one token for `user_id` now.
    pub async fn check(&self, user_id: &str) -> Result<RateLimitDecision, RateLimitError> {
        self.check_at(user_id, Utc::now()).await
    }

    /// Try to withdraw one token for `user_id` as of `now`.
    pub async fn check_at(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<RateLimitDecision, RateLimitError> {
        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let stored = self
                .store
                .load(user_id)
                .await
                .map_err(|e| RateLimitError::Store(e.to_string()))?;

            let expected_version = stored.as_ref().map(|b| b.version);
            let bucket = stored.unwrap_or_else(|| RateLimitBucket::full(self.capacity, now));
            let current = self.refill(&bucket, now);

            if current.tokens < 1.0 {
                let retry_after = self.retry_after(current.tokens);
                debug!(user_id, tokens = current.tokens, retry_after, "Rate limit: denied");
                return Ok(RateLimitDecision::deny(retry_after));
            }

            let next = RateLimitBucket {
                tokens: current.tokens - 1.0,
                last_refill: current.last_refill,
                version: current.version + 1,
            };

            let written = self
                .store
                .compare_and_set(user_id, expected_version, next)
                .await
                .map_err(|e| RateLimitError::Store(e.to_string()))?;

            if written {
                debug!(user_id, attempt, "Rate limit: token withdrawn");
                return Ok(RateLimitDecision::allow());
            }

            debug!(user_id, attempt, "Rate limit: bucket changed underneath, retrying");
        }

        warn!(user_id, attempts = MAX_CAS_ATTEMPTS, "Rate limit: giving up on contended bucket");
        Err(RateLimitError::Contention {
            user_id: user_id.to_string(),
            attempts: MAX_CAS_ATTEMPTS,
        })
    }
}

/// Process-local bucket store.
///
/// Buckets are never evicted: one entry per user id seen lives for the life
/// of the process. Fine for the CLI; long-lived servers need a store with
/// expiry.
#[derive(Default)]
pub struct InMemoryRateLimitStore {
    buckets: Mutex<HashMap<String, RateLimitBucket>>,
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn load(&self, user_id: &str) -> Result<Option<RateLimitBucket>, Error> {
        Ok(self.buckets.lock().await.get(user_id).cloned())
    }

    async fn compare_and_set(
        &self,
        user_id: &str,
        expected_version: Option<u64>,
        bucket: RateLimitBucket,
    ) -> Result<bool, Error> {
        let mut buckets = self.buckets.lock().await;
        let current_version = buckets.get(user_id).map(|b| b.version);
        if current_version != expected_version {
            return Ok(false);
        }
        buckets.insert(user_id.to_string(), bucket);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn limiter(capacity: u32, refill: f64) -> RateLimiter {
        RateLimiter::new(Arc::new(InMemoryRateLimitStore::new()), capacity, refill)
    }

    #[tokio::test]
    async fn sixth_call_denied_with_retry_after() {
        let limiter = limiter(5, 0.5);
        let now = Utc::now();

        for i in 1..=5 {
            let decision = limiter.check_at("alice", now).await.unwrap();
            assert!(decision.allowed, "call {i} should be allowed");
        }

        let decision = limiter.check_at("alice", now).await.unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.retry_after_secs, Some(2));
    }

    #[tokio::test]
    async fn users_have_separate_buckets() {
        let limiter = limiter(1, 1.0);
        let now = Utc::now();
        assert!(limiter.check_at("alice", now).await.unwrap().allowed);
        assert!(!limiter.check_at("alice", now).await.unwrap().allowed);
        assert!(limiter.check_at("bob", now).await.unwrap().allowed);
    }

    #[tokio::test]
    async fn tokens_refill_over_time() {
        let limiter = limiter(2, 1.0);
        let now = Utc::now();
        assert!(limiter.check_at("u", now).await.unwrap().allowed);
        assert!(limiter.check_at("u", now).await.unwrap().allowed);
        assert!(!limiter.check_at("u", now).await.unwrap().allowed);

        let later = now + Duration::milliseconds(1500);
        assert!(limiter.check_at("u", later).await.unwrap().allowed);
        assert!(!limiter.check_at("u", later).await.unwrap().allowed);
    }

    #[tokio::test]
    async fn refill_never_exceeds_capacity() {
        let limiter = limiter(3, 10.0);
        let now = Utc::now();
        assert!(limiter.check_at("u", now).await.unwrap().allowed);

        let much_later = now + Duration::hours(5);
        for _ in 0..3 {
            assert!(limiter.check_at("u", much_later).await.unwrap().allowed);
        }
        assert!(!limiter.check_at("u", much_later).await.unwrap().allowed);
    }

    #[test]
    fn backwards_clock_refills_nothing() {
        let limiter = limiter(5, 1.0);
        let now = Utc::now();
        let bucket = RateLimitBucket { tokens: 1.0, last_refill: now, version: 3 };

        let earlier = limiter.refill(&bucket, now - Duration::seconds(30));
        assert_eq!(earlier.tokens, 1.0);
        assert_eq!(earlier.last_refill, now);
    }

    #[test]
    fn retry_after_rounds_up() {
        let limiter = limiter(1, 0.3);
        // 0.4 tokens short at 0.3/s → 1.33s → 2s
        assert_eq!(limiter.retry_after(0.6), 2);
        assert_eq!(limiter.retry_after(0.0), 4);
        assert_eq!(limiter.retry_after(0.999_999), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_checks_never_overdraw() {
        let limiter = Arc::new(limiter(5, 0.001));
        let now = Utc::now();
        let allowed = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..20 {
            let limiter = limiter.clone();
            let allowed = allowed.clone();
            handles.push(tokio::spawn(async move {
                if limiter.check_at("shared", now).await.unwrap().allowed {
                    allowed.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(allowed.load(Ordering::SeqCst), 5);
    }

    /// Loses the first `n` CAS races, then delegates.
    struct RacyStore {
        inner: InMemoryRateLimitStore,
        lose: AtomicUsize,
    }

    #[async_trait]
    impl RateLimitStore for RacyStore {
        async fn load(&self, user_id: &str) -> Result<Option<RateLimitBucket>, Error> {
            self.inner.load(user_id).await
        }

        async fn compare_and_set(
            &self,
            user_id: &str,
            expected_version: Option<u64>,
            bucket: RateLimitBucket,
        ) -> Result<bool, Error> {
            if self.lose.load(Ordering::SeqCst) > 0 {
                self.lose.fetch_sub(1, Ordering::SeqCst);
                return Ok(false);
            }
            self.inner.compare_and_set(user_id, expected_version, bucket).await
        }
    }

    #[tokio::test]
    async fn lost_races_are_retried() {
        let store = Arc::new(RacyStore {
            inner: InMemoryRateLimitStore::new(),
            lose: AtomicUsize::new(3),
        });
        let limiter = RateLimiter::new(store, 5, 1.0);
        assert!(limiter.check("u").await.unwrap().allowed);
    }

    #[tokio::test]
    async fn endless_contention_is_an_error() {
        let store = Arc::new(RacyStore {
            inner: InMemoryRateLimitStore::new(),
            lose: AtomicUsize::new(usize::MAX),
        });
        let limiter = RateLimiter::new(store, 5, 1.0);
        assert!(matches!(
            limiter.check("u").await,
            Err(RateLimitError::Contention { attempts: MAX_CAS_ATTEMPTS, .. })
        ));
    }

    struct DownStore;

    #[async_trait]
    impl RateLimitStore for DownStore {
        async fn load(&self, _user_id: &str) -> Result<Option<RateLimitBucket>, Error> {
            Err(Error::RateLimitStore("connection refused".into()))
        }
        async fn compare_and_set(
            &self,
            _user_id: &str,
            _expected_version: Option<u64>,
            _bucket: RateLimitBucket,
        ) -> Result<bool, Error> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn store_failure_surfaces() {
        let limiter = RateLimiter::new(Arc::new(DownStore), 5, 1.0);
        let err = limiter.check("u").await.unwrap_err();
        assert!(matches!(err, RateLimitError::Store(_)));
        let core: Error = err.into();
        assert!(matches!(core, Error::RateLimitStore(_)));
    }

    #[test]
    fn from_config_uses_settings() {
        let cfg = RateLimitConfig { capacity: 7, refill_per_second: 2.0 };
        let limiter = RateLimiter::from_config(&cfg, Arc::new(InMemoryRateLimitStore::new()));
        assert_eq!(limiter.capacity, 7.0);
        assert_eq!(limiter.refill_per_second, 2.0);
    }
}
