//! Credential lookup contract.
//!
//! Credential storage (encryption, per-user vaults) lives outside the engine.
//! The engine only asks whether a key exists and, when it is about to make a
//! call, fetches it as an opaque [`Secret`] that it never inspects or logs.

use async_trait::async_trait;

/// An opaque API credential.
///
/// `Debug` and `Display` are redacted; the raw value is only reachable via
/// [`Secret::expose`], which provider clients call when building headers.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw credential. Only HTTP clients should call this.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret([REDACTED])")
    }
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Per-provider credential lookup.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Whether a credential exists for `provider`. Must not make network calls
    /// to the provider itself.
    async fn has_key(&self, provider: &str) -> bool;

    /// Fetch the credential for `provider`, if any.
    async fn get_key(&self, provider: &str) -> Option<Secret>;
}
