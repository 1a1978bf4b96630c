//! Engine wiring shared by the commands that talk to providers.

use std::sync::Arc;
use swarmforge_agent::SwarmEngine;
use swarmforge_config::{AppConfig, parse_provider_list};
use swarmforge_core::credentials::CredentialStore;
use swarmforge_core::memory::{EmbeddingIndex, MemoryStore};
use swarmforge_core::provider::Embedder;
use swarmforge_memory::{FileStore, InMemoryStore, MemoryRetriever};
use swarmforge_providers::{ProviderGateway, build_from_config};
use swarmforge_security::{InMemoryRateLimitStore, RateLimiter, StaticCredentials};
use swarmforge_telemetry::MetricsCollector;

type BoxError = Box<dyn std::error::Error>;

pub struct Runtime {
    pub engine: SwarmEngine,
    pub metrics: Option<Arc<MetricsCollector>>,
}

pub fn load_config() -> Result<AppConfig, BoxError> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}

/// Replace the configured provider order with a `--provider` list, so the
/// gateway registers and resolves keys for exactly those providers.
/// A list with no names leaves the config untouched.
pub fn apply_provider_override(config: &mut AppConfig, list: Option<&str>) {
    let Some(list) = list else { return };
    let order = parse_provider_list(list);
    if !order.is_empty() {
        config.provider_order = order;
    }
}

pub fn build_gateway(config: &AppConfig, metrics: Option<Arc<MetricsCollector>>) -> Arc<ProviderGateway> {
    build_gateway_with(config, Arc::new(StaticCredentials::from_config(config)), metrics)
}

pub fn build_gateway_with(
    config: &AppConfig,
    credentials: Arc<dyn CredentialStore>,
    metrics: Option<Arc<MetricsCollector>>,
) -> Arc<ProviderGateway> {
    Arc::new(build_from_config(config, credentials, metrics))
}

pub fn build(config: AppConfig) -> Result<Runtime, BoxError> {
    let metrics = config
        .telemetry
        .enabled
        .then(|| Arc::new(MetricsCollector::new(config.telemetry.latency_window)));

    let gateway = build_gateway(&config, metrics.clone());
    let memory = build_memory(&config, gateway.clone())?;
    let limiter = RateLimiter::from_config(&config.rate_limit, Arc::new(InMemoryRateLimitStore::new()));
    let engine = SwarmEngine::from_config(&config, gateway, limiter, memory)?;

    Ok(Runtime {
        engine,
        metrics,
    })
}

/// The configured memory store, `None` when memory is off.
pub fn open_store(
    config: &AppConfig,
) -> Result<Option<(Arc<dyn MemoryStore>, Arc<dyn EmbeddingIndex>)>, BoxError> {
    let dimension = config.memory.embedding_dimension;
    match config.memory.backend.as_str() {
        "none" => Ok(None),
        "in_memory" => {
            let store = Arc::new(InMemoryStore::new().with_dimension(dimension));
            Ok(Some((store.clone(), store)))
        }
        "file" => {
            let store = Arc::new(FileStore::with_dimension(AppConfig::memory_path(), dimension));
            Ok(Some((store.clone(), store)))
        }
        other => Err(format!("Unknown memory backend '{other}' (expected file, in_memory or none)").into()),
    }
}

fn build_memory(config: &AppConfig, embedder: Arc<dyn Embedder>) -> Result<Option<MemoryRetriever>, BoxError> {
    let Some((store, index)) = open_store(config)? else {
        return Ok(None);
    };
    Ok(Some(
        MemoryRetriever::new(store)
            .with_index(index)
            .with_embedder(embedder)
            .with_max_context_chars(config.memory.max_context_chars),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn groq_key(name: &str) -> Option<String> {
        (name == "GROQ_API_KEY").then(|| "gsk-test".to_string())
    }

    #[tokio::test]
    async fn provider_flag_reaches_gateway_and_credentials() {
        let mut config = AppConfig::default();
        apply_provider_override(&mut config, Some("groq, openai"));
        assert_eq!(config.provider_order, vec!["groq".to_string(), "openai".to_string()]);

        let credentials = Arc::new(StaticCredentials::from_config_with(&config, groq_key));
        let gateway = build_gateway_with(&config, credentials, None);

        assert_eq!(gateway.provider_ids()[..2], ["groq", "openai"]);
        let status = gateway.providers().await;
        let groq = status.iter().find(|s| s.id == "groq").unwrap();
        assert!(groq.has_credential);
    }

    #[test]
    fn empty_provider_flag_keeps_config_order() {
        let mut config = AppConfig::default();
        let before = config.provider_order.clone();
        apply_provider_override(&mut config, Some(" , "));
        assert_eq!(config.provider_order, before);
        apply_provider_override(&mut config, None);
        assert_eq!(config.provider_order, before);
    }
}
