//! Convergence controller — a bounded critique → refine loop.
//!
//! Each iteration scores the current artifact. The loop stops with
//! `approved` once a score reaches the threshold, and with `needs-revision`
//! (or `rejected` below the hard floor) when the iteration cap is hit.
//! Scores need not improve monotonically; the cap alone guarantees
//! termination.
//!
//! A critic or refiner that errors ends the loop early with the last good
//! artifact and a `rejected` decision. The error is recorded, not returned.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use swarmforge_config::ConvergenceConfig;
use swarmforge_core::agent::Agent;
use swarmforge_core::error::{Error, ProviderError, Result};
use swarmforge_core::review::{GateDecision, IterationReport};
use swarmforge_core::swarm::{MAX_ITERATIONS_CAP, SwarmRun};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::critique::{Critique, parse_critique};
use crate::orchestrator::{StepOutcome, SwarmOrchestrator};

/// Scores an artifact.
#[async_trait]
pub trait Critic: Send + Sync {
    async fn critique(&self, artifact: &str) -> Result<Critique>;
}

/// Produces the next artifact from the current one and its critique.
#[async_trait]
pub trait Refiner: Send + Sync {
    async fn refine(&self, artifact: &str, critique: &Critique) -> Result<String>;
}

/// How a convergence loop ended.
#[derive(Debug, Clone, Serialize)]
pub struct ConvergenceOutcome {
    pub final_artifact: String,
    pub history: Vec<IterationReport>,
    pub decision: GateDecision,
    /// Why the loop aborted early, if it did
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ConvergenceController {
    max_iterations: u32,
    threshold: f64,
    hard_floor: Option<f64>,
}

impl ConvergenceController {
    /// `max_iterations` is clamped to `[1, MAX_ITERATIONS_CAP]`.
    pub fn new(max_iterations: u32, threshold: f64) -> Self {
        Self {
            max_iterations: max_iterations.clamp(1, MAX_ITERATIONS_CAP),
            threshold,
            hard_floor: None,
        }
    }

    /// Scores below `floor` on the last iteration are `rejected` rather than
    /// `needs-revision`.
    pub fn with_hard_floor(mut self, floor: f64) -> Self {
        self.hard_floor = Some(floor);
        self
    }

    pub fn from_config(config: &ConvergenceConfig) -> Self {
        let controller = Self::new(config.max_iterations, config.threshold);
        match config.hard_floor {
            Some(floor) => controller.with_hard_floor(floor),
            None => controller,
        }
    }

    /// The same threshold and floor with a different iteration cap.
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations.clamp(1, MAX_ITERATIONS_CAP);
        self
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub async fn iterate(
        &self,
        artifact: String,
        critic: &dyn Critic,
        refiner: &dyn Refiner,
        cancel: &CancellationToken,
    ) -> ConvergenceOutcome {
        let mut artifact = artifact;
        let mut history: Vec<IterationReport> = Vec::new();
        let mut iteration = 1;

        loop {
            if cancel.is_cancelled() {
                return abort(artifact, history, "cancelled".to_string());
            }

            let critique = match critic.critique(&artifact).await {
                Ok(c) => c,
                Err(e) => return abort(artifact, history, format!("critic failed: {e}")),
            };

            let score = critique.score;
            let last = iteration >= self.max_iterations;
            let decision = if score >= self.threshold {
                GateDecision::Approved
            } else if last && self.hard_floor.is_some_and(|floor| score < floor) {
                GateDecision::Rejected
            } else {
                GateDecision::NeedsRevision
            };

            info!(iteration, score, decision = %decision, "Convergence iteration scored");
            let score_before = history.last().map(|r| r.score_after);
            history.push(IterationReport {
                iteration,
                score_before,
                score_after: score,
                issues: critique.issues.clone(),
                decision,
            });

            if decision == GateDecision::Approved || last {
                return ConvergenceOutcome {
                    final_artifact: artifact,
                    history,
                    decision,
                    failure: None,
                };
            }

            if cancel.is_cancelled() {
                return abort(artifact, history, "cancelled".to_string());
            }

            artifact = match refiner.refine(&artifact, &critique).await {
                Ok(next) => next,
                Err(_) if cancel.is_cancelled() => {
                    return abort(artifact, history, "cancelled".to_string());
                }
                Err(e) => return abort(artifact, history, format!("refiner failed: {e}")),
            };
            iteration += 1;
        }
    }
}

fn abort(artifact: String, history: Vec<IterationReport>, reason: String) -> ConvergenceOutcome {
    warn!(iterations = history.len(), reason = %reason, "Convergence loop aborted");
    ConvergenceOutcome {
        final_artifact: artifact,
        history,
        decision: GateDecision::Rejected,
        failure: Some(reason),
    }
}

/// Critic backed by a critic agent. Each call is recorded in the shared run.
pub struct LlmCritic {
    orchestrator: Arc<SwarmOrchestrator>,
    agent: Agent,
    task: String,
    order: Vec<String>,
    trace: Arc<Mutex<SwarmRun>>,
    cancel: CancellationToken,
}

impl LlmCritic {
    pub fn new(
        orchestrator: Arc<SwarmOrchestrator>,
        agent: Agent,
        task: impl Into<String>,
        order: Vec<String>,
        trace: Arc<Mutex<SwarmRun>>,
    ) -> Self {
        Self {
            orchestrator,
            agent,
            task: task.into(),
            order,
            trace,
            cancel: CancellationToken::new(),
        }
    }

    /// No provider call is made once `cancel` fires.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

#[async_trait]
impl Critic for LlmCritic {
    async fn critique(&self, artifact: &str) -> Result<Critique> {
        if self.cancel.is_cancelled() {
            return Err(Error::Internal("critique cancelled".into()));
        }
        let context = format!("## Artifact\n{artifact}");
        let mut run = self.trace.lock().await;
        let step = self
            .orchestrator
            .step(&mut run, &self.agent, &self.task, &context, &self.order)
            .await?;

        match step {
            StepOutcome::Output(text) => parse_critique(&text, self.agent.role.category())
                .ok_or_else(|| {
                    Error::Provider(ProviderError::InvalidResponse(format!(
                        "critic '{}' gave no score",
                        self.agent.id
                    )))
                }),
            StepOutcome::Failed(e) => Err(e),
        }
    }
}

/// Refiner that re-runs a pipeline of refiner agents with the artifact and
/// its critique as context.
pub struct PipelineRefiner {
    orchestrator: Arc<SwarmOrchestrator>,
    agents: Vec<Agent>,
    task: String,
    order: Vec<String>,
    trace: Arc<Mutex<SwarmRun>>,
    cancel: CancellationToken,
}

impl PipelineRefiner {
    pub fn new(
        orchestrator: Arc<SwarmOrchestrator>,
        agents: Vec<Agent>,
        task: impl Into<String>,
        order: Vec<String>,
        trace: Arc<Mutex<SwarmRun>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            orchestrator,
            agents,
            task: task.into(),
            order,
            trace,
            cancel,
        }
    }
}

#[async_trait]
impl Refiner for PipelineRefiner {
    async fn refine(&self, artifact: &str, critique: &Critique) -> Result<String> {
        let context = format!(
            "## Current Artifact\n{artifact}\n\n## Critique\n{}",
            critique.render()
        );
        let agents: Vec<&Agent> = self.agents.iter().collect();
        let mut run = self.trace.lock().await;
        let outcome = self
            .orchestrator
            .execute(&mut run, &agents, &self.task, &context, &self.order, &self.cancel)
            .await?;

        if outcome.cancelled {
            return Err(Error::Internal("refinement cancelled".into()));
        }
        outcome.last_output.ok_or_else(|| {
            outcome
                .last_error
                .unwrap_or_else(|| Error::Internal("no refiner agents".into()))
        })
    }
}
