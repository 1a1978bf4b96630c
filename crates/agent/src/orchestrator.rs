//! The swarm orchestrator — drives agents through the provider gateway.
//!
//! # Sequential pipeline
//!
//! ```text
//! Init → AgentIter(0) → AgentIter(1) → … → AgentIter(n-1) → Done
//! ```
//!
//! Each step renders the agent's prompt against the accumulated context and
//! makes exactly one gateway call. A success is recorded and appended to the
//! context as a labeled section; a failure is recorded as an error-tagged
//! message and the pipeline moves on without it. Cancellation is checked
//! before every step, so at most one call is in flight when it lands.
//!
//! # Fan-out
//!
//! Specialists run concurrently against the same input. `fan_out` returns
//! once every specialist has answered, failed, or hit its timeout.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use swarmforge_core::agent::Agent;
use swarmforge_core::error::{Error, Result};
use swarmforge_core::message::Message;
use swarmforge_core::provider::{Completion, CompletionOptions};
use swarmforge_core::swarm::{SwarmMessage, SwarmRequest, SwarmRun};
use swarmforge_providers::ProviderGateway;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const DEFAULT_SPECIALIST_TIMEOUT: Duration = Duration::from_secs(90);

pub struct SwarmOrchestrator {
    gateway: Arc<ProviderGateway>,
    options: CompletionOptions,
    specialist_timeout: Duration,
}

/// What a pipeline pass produced.
#[derive(Debug, Default)]
pub struct PipelineOutcome {
    /// Output of the last agent that succeeded
    pub last_output: Option<String>,
    /// Error of the last agent that failed
    pub last_error: Option<Error>,
    /// Stopped early by cancellation
    pub cancelled: bool,
}

/// Result of one recorded agent step.
#[derive(Debug)]
pub enum StepOutcome {
    Output(String),
    Failed(Error),
}

impl SwarmOrchestrator {
    pub fn new(gateway: Arc<ProviderGateway>) -> Self {
        Self {
            gateway,
            options: CompletionOptions::default(),
            specialist_timeout: DEFAULT_SPECIALIST_TIMEOUT,
        }
    }

    /// Model, temperature and token limit used for every call. An agent's
    /// preferred model overrides the model here.
    pub fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    /// Per-specialist bound for fan-out calls.
    pub fn with_specialist_timeout(mut self, timeout: Duration) -> Self {
        self.specialist_timeout = timeout;
        self
    }

    pub fn gateway(&self) -> &Arc<ProviderGateway> {
        &self.gateway
    }

    /// Run `agents` in order as one pipeline and return the finalized run.
    ///
    /// Only an internal invariant violation is an `Err`; agent failures are
    /// recorded in the trace.
    pub async fn run(
        &self,
        agents: &[&Agent],
        request: &SwarmRequest,
        initial_context: &str,
        cancel: &CancellationToken,
    ) -> Result<SwarmRun> {
        let mut run = SwarmRun::new(request.task.clone());
        run.start()?;
        info!(run_id = %run.id, agents = agents.len(), "Swarm run started");

        let outcome = self
            .execute(
                &mut run,
                agents,
                &request.task,
                initial_context,
                &request.provider_order,
                cancel,
            )
            .await?;

        if outcome.cancelled {
            run.cancel()?;
        } else {
            run.finalize()?;
        }

        info!(
            run_id = %run.id,
            status = %run.status,
            messages = run.messages.len(),
            provider = run.provider_used.as_deref().unwrap_or("-"),
            "Swarm run finished"
        );
        Ok(run)
    }

    /// Drive `agents` through an already running `run`, appending to its
    /// trace. The run is left running for the caller to finalize.
    pub async fn execute(
        &self,
        run: &mut SwarmRun,
        agents: &[&Agent],
        task: &str,
        initial_context: &str,
        order: &[String],
        cancel: &CancellationToken,
    ) -> Result<PipelineOutcome> {
        let mut context = initial_context.to_string();
        let mut outcome = PipelineOutcome::default();

        for agent in agents {
            if cancel.is_cancelled() {
                info!(run_id = %run.id, next_agent = %agent.id, "Swarm run cancelled");
                outcome.cancelled = true;
                return Ok(outcome);
            }

            match self.step(run, agent, task, &context, order).await? {
                StepOutcome::Output(text) => {
                    context = append_section(&context, agent, &text);
                    outcome.last_output = Some(text);
                }
                StepOutcome::Failed(e) => outcome.last_error = Some(e),
            }
        }

        Ok(outcome)
    }

    /// Invoke one agent and record exactly one message for it.
    pub async fn step(
        &self,
        run: &mut SwarmRun,
        agent: &Agent,
        task: &str,
        context: &str,
        order: &[String],
    ) -> Result<StepOutcome> {
        let ordinal = run.next_ordinal();
        debug!(run_id = %run.id, agent = %agent.id, ordinal, "Agent step");

        match self.call(agent, task, context, order).await {
            Ok(completion) => {
                info!(
                    run_id = %run.id,
                    agent = %agent.id,
                    ordinal,
                    provider = %completion.provider,
                    "Agent step succeeded"
                );
                run.push_message(SwarmMessage::success(
                    agent,
                    ordinal,
                    completion.text.clone(),
                    completion.provider,
                ))?;
                Ok(StepOutcome::Output(completion.text))
            }
            Err(e) => {
                warn!(run_id = %run.id, agent = %agent.id, ordinal, error = %e, "Agent step failed");
                run.push_message(SwarmMessage::failure(agent, ordinal, &e))?;
                Ok(StepOutcome::Failed(e))
            }
        }
    }

    /// Run `agents` concurrently on the same input.
    ///
    /// Returns one message per agent with ordinals in agent order. A
    /// specialist that times out or is cancelled gets an error-tagged
    /// message like any other failure.
    pub async fn fan_out(
        &self,
        agents: &[&Agent],
        task: &str,
        input: &str,
        order: &[String],
        cancel: &CancellationToken,
    ) -> Vec<SwarmMessage> {
        info!(specialists = agents.len(), "Fan-out started");
        let timeout = self.specialist_timeout;

        let calls = agents.iter().map(|agent| async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err("cancelled".to_string()),
                result = tokio::time::timeout(timeout, self.call(agent, task, input, order)) => match result {
                    Ok(Ok(completion)) => Ok(completion),
                    Ok(Err(e)) => Err(e.to_string()),
                    Err(_) => Err(format!("timed out after {}s", timeout.as_secs())),
                },
            }
        });
        let results = join_all(calls).await;

        let messages: Vec<SwarmMessage> = agents
            .iter()
            .zip(results)
            .enumerate()
            .map(|(ordinal, (agent, result))| match result {
                Ok(completion) => {
                    SwarmMessage::success(agent, ordinal, completion.text, completion.provider)
                }
                Err(reason) => {
                    warn!(agent = %agent.id, reason = %reason, "Specialist failed");
                    SwarmMessage::failure(agent, ordinal, reason)
                }
            })
            .collect();

        info!(
            specialists = messages.len(),
            failed = messages.iter().filter(|m| m.is_error).count(),
            "Fan-out finished"
        );
        messages
    }

    async fn call(
        &self,
        agent: &Agent,
        task: &str,
        context: &str,
        order: &[String],
    ) -> Result<Completion> {
        let prompt = agent.render_prompt(task, context);
        let mut options = self.options.clone();
        if let Some(model) = &agent.preferred_model {
            options.model = Some(model.clone());
        }
        self.gateway
            .complete(order, vec![Message::user(prompt)], &options)
            .await
    }
}

/// `context` extended with a labeled section for `agent`'s output.
fn append_section(context: &str, agent: &Agent, output: &str) -> String {
    let section = format!("### {} ({})\n{}", agent.name, agent.role, output.trim());
    if context.trim().is_empty() {
        section
    } else {
        format!("{context}\n\n{section}")
    }
}
