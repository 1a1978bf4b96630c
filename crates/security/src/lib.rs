//! Credential lookup and per-user admission control for SwarmForge.
//!
//! Provides:
//! - **Credentials**: provider keys from config and environment, exposed
//!   only as opaque secrets
//! - **Rate limiting**: a compare-and-set token bucket per user

pub mod credentials;
pub mod ratelimit;

pub use credentials::{env_var_name, StaticCredentials};
pub use ratelimit::{InMemoryRateLimitStore, RateLimitError, RateLimiter};
