//! Credential stores.
//!
//! The engine only sees the [`CredentialStore`] trait. The store here is built
//! once at startup from the config file and `<NAME>_API_KEY` environment
//! variables; encrypted vaults and per-user keys belong to the embedding
//! application.

use async_trait::async_trait;
use std::collections::HashMap;
use swarmforge_config::AppConfig;
use swarmforge_core::credentials::{CredentialStore, Secret};

/// Providers that run locally and accept any key.
const KEYLESS_PROVIDERS: &[&str] = &["ollama", "vllm"];

/// A fixed provider → key map.
#[derive(Default, Clone)]
pub struct StaticCredentials {
    keys: HashMap<String, Secret>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, provider: impl Into<String>, key: impl Into<String>) -> Self {
        let key = key.into();
        if !key.trim().is_empty() {
            self.keys.insert(provider.into(), Secret::new(key));
        }
        self
    }

    /// Keys from config and the process environment.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::from_config_with(config, |name| std::env::var(name).ok())
    }

    /// Keys from config, with `env` standing in for the environment.
    ///
    /// `[providers.<id>].api_key` wins over `<ID>_API_KEY`. Keyless local
    /// providers get a placeholder so the gateway doesn't skip them.
    pub fn from_config_with(config: &AppConfig, env: impl Fn(&str) -> Option<String>) -> Self {
        let mut ids: Vec<&String> = config.provider_order.iter().collect();
        ids.extend(config.providers.keys());
        ids.sort();
        ids.dedup();

        let mut store = Self::new();
        for id in ids {
            let configured = config.providers.get(id).and_then(|p| p.api_key.clone());
            let key = configured
                .or_else(|| env(&env_var_name(id)))
                .or_else(|| KEYLESS_PROVIDERS.contains(&id.as_str()).then(|| id.clone()));
            if let Some(key) = key {
                store = store.with_key(id.clone(), key);
            }
        }
        store
    }

    /// Provider ids that have a key, sorted.
    pub fn providers(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.keys.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl std::fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("providers", &self.providers())
            .finish()
    }
}

#[async_trait]
impl CredentialStore for StaticCredentials {
    async fn has_key(&self, provider: &str) -> bool {
        self.keys.contains_key(provider)
    }

    async fn get_key(&self, provider: &str) -> Option<Secret> {
        self.keys.get(provider).cloned()
    }
}

/// `openrouter` → `OPENROUTER_API_KEY`, `together-ai` → `TOGETHER_AI_API_KEY`.
pub fn env_var_name(provider: &str) -> String {
    let stem: String = provider
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("{stem}_API_KEY")
}
