//! The engine facade — one call per swarm request.
//!
//! ```text
//! validate → rate limit → memory inject → orchestrate → [converge] → outcome
//! ```
//!
//! Validation and rate-limit failures are returned before any provider is
//! called. Everything after admission reports problems inside the outcome
//! rather than as an error.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use swarmforge_config::AppConfig;
use swarmforge_core::error::{Error, Result};
use swarmforge_core::provider::CompletionOptions;
use swarmforge_core::review::{GateDecision, IterationReport, SpecialistReport};
use swarmforge_core::swarm::{SwarmMessage, SwarmRequest, SwarmRun};
use swarmforge_memory::MemoryRetriever;
use swarmforge_providers::ProviderGateway;
use swarmforge_security::RateLimiter;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::aggregator::{AggregateReport, ReportAggregator};
use crate::convergence::{ConvergenceController, LlmCritic, PipelineRefiner};
use crate::critique::parse_report;
use crate::orchestrator::SwarmOrchestrator;
use crate::registry::AgentRegistry;

const REVIEW_TASK: &str = "Review the artifact";

/// Result of [`SwarmEngine::execute`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwarmOutcome {
    pub run: SwarmRun,

    /// One report per convergence iteration; empty for single-pass runs
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<IterationReport>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub gate_decision: Option<GateDecision>,

    /// Why the convergence loop stopped early
    #[serde(skip_serializing_if = "Option::is_none")]
    pub convergence_failure: Option<String>,
}

impl SwarmOutcome {
    fn single_pass(run: SwarmRun) -> Self {
        Self {
            run,
            history: Vec::new(),
            gate_decision: None,
            convergence_failure: None,
        }
    }
}

/// Result of [`SwarmEngine::review`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewOutcome {
    pub messages: Vec<SwarmMessage>,
    pub reports: Vec<SpecialistReport>,
    pub aggregate: AggregateReport,
    /// Specialists that failed, timed out, or returned no score
    pub failed_agents: Vec<String>,
}

pub struct SwarmEngine {
    orchestrator: Arc<SwarmOrchestrator>,
    limiter: RateLimiter,
    registry: AgentRegistry,
    panel: AgentRegistry,
    memory: Option<MemoryRetriever>,
    memory_top_k: usize,
    auto_save: bool,
    convergence: ConvergenceController,
    aggregator: ReportAggregator,
    max_task_chars: usize,
    max_file_context_chars: usize,
    provider_order: Vec<String>,
}

impl SwarmEngine {
    pub fn new(orchestrator: Arc<SwarmOrchestrator>, limiter: RateLimiter) -> Self {
        Self {
            orchestrator,
            limiter,
            registry: AgentRegistry::code_pipeline(),
            panel: AgentRegistry::review_panel(),
            memory: None,
            memory_top_k: 5,
            auto_save: false,
            convergence: ConvergenceController::new(3, 80.0),
            aggregator: ReportAggregator::default(),
            max_task_chars: 20_000,
            max_file_context_chars: 200_000,
            provider_order: Vec::new(),
        }
    }

    /// Wire an engine from configuration.
    pub fn from_config(
        config: &AppConfig,
        gateway: Arc<ProviderGateway>,
        limiter: RateLimiter,
        memory: Option<MemoryRetriever>,
    ) -> Result<Self> {
        let options = CompletionOptions {
            model: None,
            temperature: config.default_temperature,
            max_tokens: Some(config.default_max_tokens),
        };
        let orchestrator = SwarmOrchestrator::new(gateway)
            .with_options(options)
            .with_specialist_timeout(Duration::from_secs(config.swarm.specialist_timeout_secs));

        let registry = if config.agents.is_empty() {
            AgentRegistry::code_pipeline()
        } else {
            AgentRegistry::from_definitions(&config.agents)?
        };

        let mut engine = Self::new(Arc::new(orchestrator), limiter)
            .with_registry(registry)
            .with_convergence(ConvergenceController::from_config(&config.convergence))
            .with_aggregator(ReportAggregator::from_config(&config.aggregator))
            .with_limits(config.swarm.max_task_chars, config.swarm.max_file_context_chars)
            .with_provider_order(config.provider_order.clone())
            .with_auto_save(config.memory.auto_save);
        if let Some(memory) = memory {
            engine = engine.with_memory(memory, config.memory.top_k);
        }
        Ok(engine)
    }

    /// Agents for [`execute`](Self::execute).
    pub fn with_registry(mut self, registry: AgentRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Specialists for [`review`](Self::review).
    pub fn with_panel(mut self, panel: AgentRegistry) -> Self {
        self.panel = panel;
        self
    }

    pub fn with_memory(mut self, memory: MemoryRetriever, top_k: usize) -> Self {
        self.memory = Some(memory);
        self.memory_top_k = top_k;
        self
    }

    /// Store each completed run's output as a new memory.
    pub fn with_auto_save(mut self, enabled: bool) -> Self {
        self.auto_save = enabled;
        self
    }

    /// Threshold and hard floor for convergence. The iteration cap comes
    /// from each request.
    pub fn with_convergence(mut self, controller: ConvergenceController) -> Self {
        self.convergence = controller;
        self
    }

    pub fn with_aggregator(mut self, aggregator: ReportAggregator) -> Self {
        self.aggregator = aggregator;
        self
    }

    pub fn with_limits(mut self, max_task_chars: usize, max_file_context_chars: usize) -> Self {
        self.max_task_chars = max_task_chars;
        self.max_file_context_chars = max_file_context_chars;
        self
    }

    /// Provider order for reviews.
    pub fn with_provider_order(mut self, order: Vec<String>) -> Self {
        self.provider_order = order;
        self
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn panel(&self) -> &AgentRegistry {
        &self.panel
    }

    pub fn gateway(&self) -> &Arc<ProviderGateway> {
        self.orchestrator.gateway()
    }

    /// Run a swarm for `user_id`.
    pub async fn execute(
        &self,
        user_id: &str,
        request: SwarmRequest,
        cancel: &CancellationToken,
    ) -> Result<SwarmOutcome> {
        request.validate(self.max_task_chars, self.max_file_context_chars)?;
        self.admit(user_id).await?;

        let context = self.initial_context(&request).await;
        let iterations = request.clamped_iterations();

        let outcome = if iterations > 1 {
            self.converge(&request, &context, iterations, cancel).await?
        } else {
            let agents = self.registry.agents_in_order();
            let run = self.orchestrator.run(&agents, &request, &context, cancel).await?;
            SwarmOutcome::single_pass(run)
        };

        self.remember(&outcome.run).await;
        Ok(outcome)
    }

    /// Review `artifact` with the specialist panel and aggregate the results.
    pub async fn review(
        &self,
        user_id: &str,
        artifact: &str,
        cancel: &CancellationToken,
    ) -> Result<ReviewOutcome> {
        if artifact.trim().is_empty() {
            return Err(Error::Validation("artifact must not be empty".into()));
        }
        let chars = artifact.chars().count();
        if chars > self.max_file_context_chars {
            return Err(Error::Validation(format!(
                "artifact is {chars} characters, limit is {}",
                self.max_file_context_chars
            )));
        }
        if self.provider_order.is_empty() {
            return Err(Error::Validation("no provider order configured for review".into()));
        }
        self.admit(user_id).await?;

        let agents = self.panel.agents_in_order();
        let input = format!("## Artifact\n{artifact}");
        let messages = self
            .orchestrator
            .fan_out(&agents, REVIEW_TASK, &input, &self.provider_order, cancel)
            .await;

        let mut reports = Vec::new();
        let mut failed_agents = Vec::new();
        for message in &messages {
            if message.is_error {
                failed_agents.push(message.agent_id.clone());
                continue;
            }
            match parse_report(&message.agent_id, message.role.category(), &message.content) {
                Some(report) => reports.push(report),
                None => {
                    warn!(agent = %message.agent_id, "Specialist output had no score");
                    failed_agents.push(message.agent_id.clone());
                }
            }
        }

        let aggregate = self.aggregator.aggregate(&reports);
        info!(
            specialists = messages.len(),
            scored = reports.len(),
            overall = aggregate.overall_score,
            "Review aggregated"
        );

        Ok(ReviewOutcome {
            messages,
            reports,
            aggregate,
            failed_agents,
        })
    }

    async fn admit(&self, user_id: &str) -> Result<()> {
        let decision = self.limiter.check(user_id).await?;
        if decision.allowed {
            return Ok(());
        }
        let retry_after_secs = decision.retry_after_secs.unwrap_or(1);
        info!(user_id, retry_after_secs, "Request rejected by rate limiter");
        Err(Error::RateLimitExceeded { retry_after_secs })
    }

    /// File contents plus retrieved memory.
    async fn initial_context(&self, request: &SwarmRequest) -> String {
        let files: Vec<String> = request
            .file_context
            .iter()
            .enumerate()
            .map(|(i, content)| format!("## File {}\n{}", i + 1, content.trim()))
            .collect();
        let base = files.join("\n\n");

        match &self.memory {
            Some(memory) => memory
                .inject(&base, &request.task, self.memory_top_k)
                .await
                .trim_start()
                .to_string(),
            None => base,
        }
    }

    async fn converge(
        &self,
        request: &SwarmRequest,
        context: &str,
        iterations: u32,
        cancel: &CancellationToken,
    ) -> Result<SwarmOutcome> {
        let roles = self.registry.convergence_roles();
        let mut run = SwarmRun::new(request.task.clone());
        run.start()?;
        info!(run_id = %run.id, max_iterations = iterations, "Convergence run started");

        let first = self
            .orchestrator
            .execute(
                &mut run,
                &roles.pipeline,
                &request.task,
                context,
                &request.provider_order,
                cancel,
            )
            .await?;

        if first.cancelled || cancel.is_cancelled() {
            run.cancel()?;
            return Ok(SwarmOutcome::single_pass(run));
        }
        let Some(artifact) = first.last_output else {
            run.finalize()?;
            return Ok(SwarmOutcome::single_pass(run));
        };

        let trace = Arc::new(Mutex::new(run));
        let critic = LlmCritic::new(
            self.orchestrator.clone(),
            roles.critic,
            request.task.clone(),
            request.provider_order.clone(),
            trace.clone(),
        )
        .with_cancel(cancel.clone());
        let refiner = PipelineRefiner::new(
            self.orchestrator.clone(),
            roles.refiners,
            request.task.clone(),
            request.provider_order.clone(),
            trace.clone(),
            cancel.clone(),
        );

        let result = self
            .convergence
            .clone()
            .with_max_iterations(iterations)
            .iterate(artifact, &critic, &refiner, cancel)
            .await;

        let mut run = trace.lock().await.clone();
        run.iteration_count = (result.history.len() as u32).max(1);
        if cancel.is_cancelled() {
            run.cancel_with(result.final_artifact.clone())?;
        } else {
            run.finalize_with(result.final_artifact.clone())?;
        }

        info!(
            run_id = %run.id,
            iterations = run.iteration_count,
            decision = %result.decision,
            "Convergence run finished"
        );

        Ok(SwarmOutcome {
            run,
            history: result.history,
            gate_decision: Some(result.decision),
            convergence_failure: result.failure,
        })
    }

    async fn remember(&self, run: &SwarmRun) {
        if !self.auto_save || !run.is_completed() {
            return;
        }
        let Some(memory) = &self.memory else {
            return;
        };

        let mut metadata = serde_json::Map::new();
        metadata.insert("run_id".into(), serde_json::Value::String(run.id.clone()));
        metadata.insert("task".into(), serde_json::Value::String(run.task.clone()));
        let content = format!("Task: {}\nOutcome: {}", run.task, run.final_output);

        match memory.remember(&content, metadata).await {
            Ok(id) => debug!(run_id = %run.id, memory_id = %id, "Run saved to memory"),
            Err(e) => warn!(run_id = %run.id, error = %e, "Failed to save run to memory"),
        }
    }
}
