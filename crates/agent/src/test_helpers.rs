//! Shared test helpers: scripted providers and a gateway wired to them.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use swarmforge_core::credentials::Secret;
use swarmforge_core::error::ProviderError;
use swarmforge_core::message::Message;
use swarmforge_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use swarmforge_providers::{ProviderEntry, ProviderGateway};
use swarmforge_security::StaticCredentials;
use tokio_util::sync::CancellationToken;

type Reply = Result<String, ProviderError>;

/// A mock provider that returns a sequence of scripted replies.
///
/// Each call to `complete` returns the next reply in the queue.
/// Panics if more calls are made than replies provided.
pub struct SequentialMockProvider {
    replies: Mutex<Vec<Reply>>,
    prompts: Mutex<Vec<String>>,
    cancel_on: Option<(usize, CancellationToken)>,
}

impl SequentialMockProvider {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies),
            prompts: Mutex::new(Vec::new()),
            cancel_on: None,
        }
    }

    /// Cancel `token` while answering call number `call` (0-based).
    pub fn cancel_on(mut self, call: usize, token: CancellationToken) -> Self {
        self.cancel_on = Some((call, token));
        self
    }

    /// Every call succeeds, in order.
    pub fn texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(t.to_string())).collect())
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    /// Prompt text of every call so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(
        &self,
        _credential: &Secret,
        request: ProviderRequest,
    ) -> Result<ProviderResponse, ProviderError> {
        let prompt = request
            .messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let mut prompts = self.prompts.lock().unwrap();
        let replies = self.replies.lock().unwrap();
        let call = prompts.len();
        if call >= replies.len() {
            panic!(
                "SequentialMockProvider: no more replies (call #{}, have {})",
                call,
                replies.len()
            );
        }
        prompts.push(prompt);
        if let Some((at, token)) = &self.cancel_on {
            if *at == call {
                token.cancel();
            }
        }
        replies[call].clone().map(|text| make_text_response(&text))
    }
}

/// Answers by the first rule whose keyword appears in the prompt.
///
/// Order-independent, so it suits concurrent fan-out tests.
pub struct KeywordMockProvider {
    rules: Vec<(String, Reply)>,
    hang_on: Vec<String>,
}

impl KeywordMockProvider {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            hang_on: Vec::new(),
        }
    }

    pub fn reply(mut self, keyword: &str, text: &str) -> Self {
        self.rules.push((keyword.into(), Ok(text.into())));
        self
    }

    pub fn fail(mut self, keyword: &str, error: ProviderError) -> Self {
        self.rules.push((keyword.into(), Err(error)));
        self
    }

    /// Never answer prompts containing `keyword`.
    pub fn hang(mut self, keyword: &str) -> Self {
        self.hang_on.push(keyword.into());
        self
    }
}

#[async_trait::async_trait]
impl Provider for KeywordMockProvider {
    fn name(&self) -> &str {
        "keyword_mock"
    }

    async fn complete(
        &self,
        _credential: &Secret,
        request: ProviderRequest,
    ) -> Result<ProviderResponse, ProviderError> {
        let prompt: String = request.messages.iter().map(|m| m.content.as_str()).collect();

        if self.hang_on.iter().any(|k| prompt.contains(k.as_str())) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }

        self.rules
            .iter()
            .find(|(keyword, _)| prompt.contains(keyword.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| Err(ProviderError::InvalidResponse("no rule matched".into())))
            .map(|text| make_text_response(&text))
    }
}

/// Create a simple text response.
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// A gateway with one keyed provider registered under `id`.
pub fn gateway_with(id: &str, provider: Arc<dyn Provider>) -> Arc<ProviderGateway> {
    let credentials = StaticCredentials::new().with_key(id, "test-key");
    Arc::new(
        ProviderGateway::builder(Arc::new(credentials))
            .provider(ProviderEntry::new(id, provider))
            .build(),
    )
}

pub fn order(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
}
