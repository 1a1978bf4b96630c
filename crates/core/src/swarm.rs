//! Swarm run types: the input contract, the message trace, and the run record.
//!
//! A [`SwarmRun`] is created at orchestration start, owned by the orchestrator
//! while it runs, and immutable once finalized. Its status only moves forward:
//! `pending → running → {completed | failed}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agent::{Agent, AgentRole};
use crate::error::{Error, Result};

/// `final_output` of a run in which no agent succeeded.
pub const FAILURE_SENTINEL: &str = "[SWARM_FAILED] no agent produced output";

/// Prefix of every error-tagged message's content.
pub const AGENT_ERROR_MARKER: &str = "[AGENT_ERROR]";

/// Hard cap for convergence iterations accepted from callers.
pub const MAX_ITERATIONS_CAP: u32 = 10;

/// One entry in a run's trace. Produced exactly once per agent invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwarmMessage {
    pub agent_id: String,

    pub role: AgentRole,

    /// Agent output, or `AGENT_ERROR_MARKER` followed by the failure reason
    pub content: String,

    /// Position in the trace; contiguous from 0
    pub ordinal: usize,

    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    pub is_error: bool,

    /// Provider that served the call (successful messages only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

impl SwarmMessage {
    pub fn success(agent: &Agent, ordinal: usize, content: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            agent_id: agent.id.clone(),
            role: agent.role,
            content: content.into(),
            ordinal,
            timestamp: Utc::now(),
            is_error: false,
            provider: Some(provider.into()),
        }
    }

    pub fn failure(agent: &Agent, ordinal: usize, reason: impl std::fmt::Display) -> Self {
        Self {
            agent_id: agent.id.clone(),
            role: agent.role,
            content: format!("{AGENT_ERROR_MARKER} {reason}"),
            ordinal,
            timestamp: Utc::now(),
            is_error: true,
            provider: None,
        }
    }
}

/// Lifecycle state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    /// Whether `self → next` is a legal forward transition.
    pub fn can_transition_to(self, next: RunStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Why a run finished as `failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Every agent invocation failed
    AllAgentsFailed,
    /// The registry had no enabled agents
    NoAgents,
    /// The caller cancelled between agent steps
    Cancelled,
}

/// The record of one orchestrated pipeline execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwarmRun {
    pub id: String,

    pub task: String,

    pub messages: Vec<SwarmMessage>,

    pub final_output: String,

    pub status: RunStatus,

    pub iteration_count: u32,

    /// Provider that served the last successful agent call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_used: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<FailureReason>,

    pub started_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl SwarmRun {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            task: task.into(),
            messages: Vec::new(),
            final_output: String::new(),
            status: RunStatus::Pending,
            iteration_count: 1,
            provider_used: None,
            failure_reason: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    fn transition(&mut self, next: RunStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::Internal(format!(
                "illegal run transition {} -> {} (run {})",
                self.status, next, self.id
            )));
        }
        self.status = next;
        Ok(())
    }

    /// `pending → running`.
    pub fn start(&mut self) -> Result<()> {
        self.transition(RunStatus::Running)
    }

    /// Ordinal the next message will receive.
    pub fn next_ordinal(&self) -> usize {
        self.messages.len()
    }

    /// Append a message to the trace. Only legal while running, and only with
    /// the next contiguous ordinal.
    pub fn push_message(&mut self, message: SwarmMessage) -> Result<()> {
        if self.status != RunStatus::Running {
            return Err(Error::Internal(format!(
                "cannot record message on {} run {}",
                self.status, self.id
            )));
        }
        if message.ordinal != self.next_ordinal() {
            return Err(Error::Internal(format!(
                "non-contiguous ordinal {} (expected {})",
                message.ordinal,
                self.next_ordinal()
            )));
        }
        if !message.is_error {
            self.provider_used = message.provider.clone();
        }
        self.messages.push(message);
        Ok(())
    }

    fn last_success(&self) -> Option<&SwarmMessage> {
        self.messages.iter().rev().find(|m| !m.is_error)
    }

    /// `running → completed | failed`, deriving `final_output` from the trace.
    pub fn finalize(&mut self) -> Result<()> {
        match self.last_success().map(|m| m.content.clone()) {
            Some(output) => self.close(RunStatus::Completed, output, None),
            None => {
                let reason = if self.messages.is_empty() {
                    FailureReason::NoAgents
                } else {
                    FailureReason::AllAgentsFailed
                };
                self.close(RunStatus::Failed, FAILURE_SENTINEL.to_string(), Some(reason))
            }
        }
    }

    /// `running → completed` with an output picked by the caller, such as the
    /// artifact a convergence loop settled on.
    pub fn finalize_with(&mut self, output: impl Into<String>) -> Result<()> {
        self.close(RunStatus::Completed, output.into(), None)
    }

    /// `running → failed` with reason `cancelled`. Output produced before the
    /// cancellation is kept as `final_output`.
    pub fn cancel(&mut self) -> Result<()> {
        let output = self
            .last_success()
            .map(|m| m.content.clone())
            .unwrap_or_else(|| FAILURE_SENTINEL.to_string());
        self.cancel_with(output)
    }

    /// `running → failed` with reason `cancelled`, keeping `output`.
    pub fn cancel_with(&mut self, output: impl Into<String>) -> Result<()> {
        self.close(RunStatus::Failed, output.into(), Some(FailureReason::Cancelled))
    }

    fn close(&mut self, status: RunStatus, output: String, reason: Option<FailureReason>) -> Result<()> {
        self.transition(status)?;
        self.final_output = output;
        self.failure_reason = reason;
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }
}

/// The engine's input contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwarmRequest {
    pub task: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub file_context: Vec<String>,

    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    pub provider_order: Vec<String>,
}

fn default_max_iterations() -> u32 {
    1
}

impl SwarmRequest {
    pub fn new(task: impl Into<String>, provider_order: Vec<String>) -> Self {
        Self {
            task: task.into(),
            file_context: Vec::new(),
            max_iterations: default_max_iterations(),
            provider_order,
        }
    }

    pub fn with_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_file(mut self, content: impl Into<String>) -> Self {
        self.file_context.push(content.into());
        self
    }

    /// `max_iterations` clamped to `[1, MAX_ITERATIONS_CAP]`.
    pub fn clamped_iterations(&self) -> u32 {
        self.max_iterations.clamp(1, MAX_ITERATIONS_CAP)
    }

    /// Reject malformed or oversized input before any provider is called.
    pub fn validate(&self, max_task_chars: usize, max_file_context_chars: usize) -> Result<()> {
        if self.task.trim().is_empty() {
            return Err(Error::Validation("task must not be empty".into()));
        }
        let task_chars = self.task.chars().count();
        if task_chars > max_task_chars {
            return Err(Error::Validation(format!(
                "task is {task_chars} characters, limit is {max_task_chars}"
            )));
        }
        let file_chars: usize = self.file_context.iter().map(|f| f.chars().count()).sum();
        if file_chars > max_file_context_chars {
            return Err(Error::Validation(format!(
                "file context is {file_chars} characters, limit is {max_file_context_chars}"
            )));
        }
        if self.provider_order.is_empty() {
            return Err(Error::Validation("provider_order must name at least one provider".into()));
        }
        if self.provider_order.iter().any(|p| p.trim().is_empty()) {
            return Err(Error::Validation("provider_order contains an empty provider id".into()));
        }
        Ok(())
    }
}
