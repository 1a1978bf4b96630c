//! Gateway construction from configuration.
//!
//! Registers every provider named in `[providers.*]` or `provider_order`,
//! picking the native Anthropic client for `anthropic` and the
//! OpenAI-compatible client for everything else.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use swarmforge_config::{AppConfig, ProviderConfig};
use swarmforge_core::credentials::CredentialStore;
use swarmforge_core::provider::Provider;
use swarmforge_telemetry::MetricsCollector;
use crate::anthropic::AnthropicProvider;
use crate::gateway::{ProviderEntry, ProviderGateway};
use crate::openai_compat::OpenAiCompatProvider;

/// Build a gateway from configuration.
pub fn build_from_config(
    config: &AppConfig,
    credentials: Arc<dyn CredentialStore>,
    metrics: Option<Arc<MetricsCollector>>,
) -> ProviderGateway {
    let mut builder = ProviderGateway::builder(credentials)
        .embedding_dimension(config.memory.embedding_dimension)
        .default_model(&config.default_model);

    if let Some(metrics) = metrics {
        builder = builder.metrics(metrics);
    }

    // Configured providers first, in provider_order, then the rest by name.
    let mut ids: Vec<String> = Vec::new();
    for id in &config.provider_order {
        if !ids.contains(id) {
            ids.push(id.clone());
        }
    }
    let extra: BTreeSet<&String> = config
        .providers
        .keys()
        .filter(|id| !ids.contains(id))
        .collect();
    ids.extend(extra.into_iter().cloned());

    for id in ids {
        let provider_config = config.providers.get(&id);
        builder = builder.provider(build_entry(&id, provider_config, &config.default_model));
    }

    builder.build()
}

fn build_entry(id: &str, provider_config: Option<&ProviderConfig>, global_model: &str) -> ProviderEntry {
    let api_url = provider_config.and_then(|c| c.api_url.clone());
    let embedding_model = provider_config
        .and_then(|c| c.embedding_model.clone())
        .or_else(|| default_embedding_model(id).map(String::from));

    let provider: Arc<dyn Provider> = if id == "anthropic" {
        let mut p = AnthropicProvider::new();
        if let Some(url) = &api_url {
            p = p.with_base_url(url);
        }
        Arc::new(p)
    } else {
        let base_url = api_url.unwrap_or_else(|| default_base_url(id));
        let mut p = OpenAiCompatProvider::new(id, base_url);
        if embedding_model.is_some() {
            p = p.with_embeddings();
        }
        Arc::new(p)
    };

    let timeout = provider_config.map(|c| c.timeout_secs).unwrap_or(120);
    let default_model = provider_config
        .and_then(|c| c.default_model.clone())
        .or_else(|| default_model_for(id).map(String::from))
        .unwrap_or_else(|| global_model.to_string());

    let mut entry = ProviderEntry::new(id, provider)
        .with_timeout(Duration::from_secs(timeout))
        .with_default_model(default_model);

    if id != "anthropic" {
        if let Some(model) = embedding_model {
            entry = entry.with_embedding_model(model);
        }
    }

    entry
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "deepseek" => "https://api.deepseek.com/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "fireworks" => "https://api.fireworks.ai/inference/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}

/// Chat model used when the provider section doesn't name one.
/// `None` means the global `default_model` applies.
fn default_model_for(provider_name: &str) -> Option<&'static str> {
    match provider_name {
        "openai" => Some("gpt-4o-mini"),
        "anthropic" => Some("claude-sonnet-4-20250514"),
        "groq" => Some("llama-3.3-70b-versatile"),
        "deepseek" => Some("deepseek-chat"),
        _ => None,
    }
}

fn default_embedding_model(provider_name: &str) -> Option<&'static str> {
    match provider_name {
        "openai" => Some("text-embedding-3-small"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use swarmforge_core::credentials::Secret;

    struct NoKeys;

    #[async_trait]
    impl CredentialStore for NoKeys {
        async fn has_key(&self, _provider: &str) -> bool {
            false
        }
        async fn get_key(&self, _provider: &str) -> Option<Secret> {
            None
        }
    }

    #[test]
    fn default_base_urls() {
        assert!(default_base_url("openrouter").contains("openrouter.ai"));
        assert!(default_base_url("openai").contains("api.openai.com"));
        assert!(default_base_url("ollama").contains("localhost:11434"));
    }

    #[test]
    fn build_from_default_config() {
        let config = AppConfig::default();
        let gateway = build_from_config(&config, Arc::new(NoKeys), None);
        assert_eq!(gateway.provider_ids(), vec!["openrouter", "openai", "anthropic"]);
        assert_eq!(gateway.embedding_dimension(), 1536);
    }

    #[tokio::test]
    async fn extra_configured_providers_are_registered() {
        let mut config = AppConfig::default();
        config.provider_order = vec!["anthropic".into()];
        config.providers.insert(
            "ollama".into(),
            ProviderConfig {
                api_key: None,
                api_url: Some("http://gpu:11434/v1".into()),
                default_model: Some("llama3".into()),
                embedding_model: Some("nomic-embed-text".into()),
                timeout_secs: 30,
            },
        );

        let gateway = build_from_config(&config, Arc::new(NoKeys), None);
        assert_eq!(gateway.provider_ids(), vec!["anthropic", "ollama"]);

        let status = gateway.providers().await;
        assert!(!status[0].embeddings);
        assert!(status[1].embeddings);
        assert_eq!(status[1].timeout_secs, 30);
    }

    #[tokio::test]
    async fn openai_embeds_by_default() {
        let config = AppConfig::default();
        let gateway = build_from_config(&config, Arc::new(NoKeys), None);
        let status = gateway.providers().await;
        let openai = status.iter().find(|s| s.id == "openai").unwrap();
        assert!(openai.embeddings);
    }
}
