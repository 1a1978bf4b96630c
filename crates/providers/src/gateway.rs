//! Provider gateway — ordered fallback across LLM vendors.
//!
//! `complete` walks a caller-supplied provider order. A provider without a
//! credential is skipped before any network call. Any failure (auth, network,
//! non-2xx, timeout, empty output) moves on to the next provider; nothing from
//! a failed attempt reaches the result. Retries are order advances, never
//! same-provider retries.
//!
//! `embed` uses the same discipline over embedding-capable providers and
//! returns `None` instead of an error when nothing works.

use async_trait::async_trait;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use swarmforge_core::credentials::{CredentialStore, Secret};
use swarmforge_core::error::{Error, ProviderError, Result};
use swarmforge_core::message::Message;
use swarmforge_core::provider::*;
use swarmforge_telemetry::MetricsCollector;
use tracing::{debug, info, warn};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// One registered provider.
pub struct ProviderEntry {
    id: String,
    provider: Arc<dyn Provider>,
    timeout: Duration,
    default_model: Option<String>,
    embedding_model: Option<String>,
}

impl ProviderEntry {
    /// Register `provider` under `id` with the default timeout (120s).
    pub fn new(id: impl Into<String>, provider: Arc<dyn Provider>) -> Self {
        Self {
            id: id.into(),
            provider,
            timeout: DEFAULT_TIMEOUT,
            default_model: None,
            embedding_model: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    /// Only providers with an embedding model are tried by `embed`.
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = Some(model.into());
        self
    }

    fn can_embed(&self) -> bool {
        self.embedding_model.is_some() && self.provider.supports_embeddings()
    }
}

/// What `providers()` reports about a registered entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderStatus {
    pub id: String,
    pub has_credential: bool,
    pub embeddings: bool,
    pub timeout_secs: u64,
}

/// Builder for [`ProviderGateway`].
pub struct GatewayBuilder {
    entries: Vec<ProviderEntry>,
    credentials: Arc<dyn CredentialStore>,
    metrics: Option<Arc<MetricsCollector>>,
    embedding_dimension: usize,
    default_model: String,
}

impl GatewayBuilder {
    pub fn provider(mut self, entry: ProviderEntry) -> Self {
        // Re-registering an id replaces the old entry in place.
        if let Some(existing) = self.entries.iter_mut().find(|e| e.id == entry.id) {
            *existing = entry;
        } else {
            self.entries.push(entry);
        }
        self
    }

    pub fn metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn embedding_dimension(mut self, dimension: usize) -> Self {
        self.embedding_dimension = dimension;
        self
    }

    /// Model used when neither the call nor the entry names one.
    pub fn default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn build(self) -> ProviderGateway {
        ProviderGateway {
            entries: self.entries,
            credentials: self.credentials,
            metrics: self.metrics,
            embedding_dimension: self.embedding_dimension,
            default_model: self.default_model,
            embed_cache: RwLock::new(None),
        }
    }
}

/// Uniform `complete`/`embed` over every registered vendor.
pub struct ProviderGateway {
    entries: Vec<ProviderEntry>,
    credentials: Arc<dyn CredentialStore>,
    metrics: Option<Arc<MetricsCollector>>,
    embedding_dimension: usize,
    default_model: String,
    /// Last provider that produced a valid embedding.
    embed_cache: RwLock<Option<String>>,
}

impl ProviderGateway {
    pub fn builder(credentials: Arc<dyn CredentialStore>) -> GatewayBuilder {
        GatewayBuilder {
            entries: Vec::new(),
            credentials,
            metrics: None,
            embedding_dimension: 1536,
            default_model: "gpt-4o-mini".into(),
        }
    }

    fn entry(&self, id: &str) -> Option<&ProviderEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Registered provider ids, in registration order.
    pub fn provider_ids(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.id.as_str()).collect()
    }

    pub fn embedding_dimension(&self) -> usize {
        self.embedding_dimension
    }

    /// Credential and capability status of every registered provider.
    pub async fn providers(&self) -> Vec<ProviderStatus> {
        let mut out = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            out.push(ProviderStatus {
                id: entry.id.clone(),
                has_credential: self.credentials.has_key(&entry.id).await,
                embeddings: entry.can_embed(),
                timeout_secs: entry.timeout.as_secs(),
            });
        }
        out
    }

    /// Resolve the credential for `id`, or `None` to skip the provider.
    async fn credential_for(&self, id: &str) -> Option<Secret> {
        if !self.credentials.has_key(id).await {
            return None;
        }
        self.credentials.get_key(id).await.filter(|s| !s.is_empty())
    }

    fn record(&self, id: &str, started: Instant, success: bool) {
        if let Some(metrics) = &self.metrics {
            metrics.record(id, started.elapsed(), success);
        }
    }

    /// Send `messages` to the first provider in `order` that answers.
    pub async fn complete(
        &self,
        order: &[String],
        messages: Vec<Message>,
        options: &CompletionOptions,
    ) -> Result<Completion> {
        let mut attempted = Vec::new();

        for (i, id) in order.iter().enumerate() {
            attempted.push(id.clone());

            let Some(entry) = self.entry(id) else {
                warn!(provider = %id, "Gateway: unknown provider, skipping");
                continue;
            };

            let Some(credential) = self.credential_for(id).await else {
                debug!(provider = %id, "Gateway: no credential, skipping");
                continue;
            };

            let model = options
                .model
                .clone()
                .or_else(|| entry.default_model.clone())
                .unwrap_or_else(|| self.default_model.clone());

            let request = ProviderRequest {
                model,
                messages: messages.clone(),
                temperature: options.temperature,
                max_tokens: options.max_tokens,
            };

            info!(
                provider = %id,
                attempt = i + 1,
                total = order.len(),
                model = %request.model,
                "Gateway: trying provider"
            );

            let started = Instant::now();
            let outcome =
                match tokio::time::timeout(entry.timeout, entry.provider.complete(&credential, request))
                    .await
                {
                    Ok(Ok(response)) if response.message.content.trim().is_empty() => Err(
                        ProviderError::InvalidResponse("provider returned empty content".into()),
                    ),
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::Timeout(format!(
                        "Provider '{}' timed out after {}s",
                        id,
                        entry.timeout.as_secs()
                    ))),
                };

            match outcome {
                Ok(response) => {
                    self.record(id, started, true);
                    return Ok(Completion {
                        text: response.message.content,
                        provider: id.clone(),
                        model: response.model,
                        usage: response.usage,
                    });
                }
                Err(e) => {
                    self.record(id, started, false);
                    warn!(
                        provider = %id,
                        error = %e,
                        "Gateway: provider failed, trying next"
                    );
                }
            }
        }

        Err(Error::NoProviderAvailable { attempted })
    }

    /// Embedding-capable entries, cached last-good provider first.
    fn embedding_candidates(&self) -> Vec<&ProviderEntry> {
        let cached = self
            .embed_cache
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        let mut candidates: Vec<&ProviderEntry> =
            self.entries.iter().filter(|e| e.can_embed()).collect();
        if let Some(cached) = cached {
            if let Some(pos) = candidates.iter().position(|e| e.id == cached) {
                let preferred = candidates.remove(pos);
                candidates.insert(0, preferred);
            }
        }
        candidates
    }

    async fn try_embed(&self, entry: &ProviderEntry, text: &str) -> std::result::Result<Vec<f32>, ProviderError> {
        let credential = self
            .credential_for(&entry.id)
            .await
            .ok_or_else(|| ProviderError::MissingCredential(entry.id.clone()))?;

        let request = EmbeddingRequest {
            model: entry.embedding_model.clone().unwrap_or_default(),
            inputs: vec![text.to_string()],
        };

        let response = tokio::time::timeout(entry.timeout, entry.provider.embed(&credential, request))
            .await
            .map_err(|_| ProviderError::Timeout(format!("Embedding via '{}' timed out", entry.id)))??;

        let vector = response
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("no embedding returned".into()))?;

        if vector.len() != self.embedding_dimension {
            return Err(ProviderError::InvalidResponse(format!(
                "embedding has dimension {}, expected {}",
                vector.len(),
                self.embedding_dimension
            )));
        }

        Ok(vector)
    }

    /// Embed `text`, or `None` when no embedding provider can.
    pub async fn embed_text(&self, text: &str) -> Option<Vec<f32>> {
        for entry in self.embedding_candidates() {
            let started = Instant::now();
            match self.try_embed(entry, text).await {
                Ok(vector) => {
                    self.record(&entry.id, started, true);
                    *self.embed_cache.write().unwrap_or_else(|e| e.into_inner()) =
                        Some(entry.id.clone());
                    return Some(vector);
                }
                Err(ProviderError::MissingCredential(_)) => {
                    debug!(provider = %entry.id, "Gateway: no credential for embeddings, skipping");
                }
                Err(e) => {
                    self.record(&entry.id, started, false);
                    warn!(provider = %entry.id, error = %e, "Gateway: embedding failed, trying next");
                }
            }
        }

        debug!("Gateway: no embedding provider available");
        None
    }
}

#[async_trait]
impl Embedder for ProviderGateway {
    async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        self.embed_text(text).await
    }
}
