//! Review and quality-gate types shared by the convergence loop and the
//! report aggregator.

use serde::{Deserialize, Serialize};

use crate::agent::SpecialistCategory;

/// Issue severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" | "note" => Ok(Self::Info),
            "low" | "minor" => Ok(Self::Low),
            "medium" | "moderate" => Ok(Self::Medium),
            "high" | "major" => Ok(Self::High),
            "critical" | "blocker" => Ok(Self::Critical),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

/// A single finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub category: SpecialistCategory,
    pub severity: Severity,
    pub message: String,
}

impl Issue {
    pub fn new(category: SpecialistCategory, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            category,
            severity,
            message: message.into(),
        }
    }
}

/// One specialist's scored review of an artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecialistReport {
    pub agent_id: String,
    pub category: SpecialistCategory,
    /// 0–100
    pub score: f64,
    pub issues: Vec<Issue>,
}

/// Terminal verdict of a convergence loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GateDecision {
    Approved,
    NeedsRevision,
    Rejected,
}

impl std::fmt::Display for GateDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Approved => "approved",
            Self::NeedsRevision => "needs-revision",
            Self::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// What happened in one critique→refine iteration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IterationReport {
    /// 1-based
    pub iteration: u32,

    /// Score of the previous iteration, `None` on the first
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_before: Option<f64>,

    /// Critic score of this iteration's artifact
    pub score_after: f64,

    pub issues: Vec<Issue>,

    /// `needs-revision` for iterations that led to a refine step; the loop's
    /// terminal decision on the last one
    pub decision: GateDecision,
}
