//! Specialist agent definitions.
//!
//! Roles are a closed enum: every role has a canonical position in a pipeline,
//! a default prompt template, and a review category. Adding a role means
//! adding a variant here; the orchestrator never matches on role names.

use serde::{Deserialize, Serialize};

/// The job a specialist performs.
///
/// Variant order is the canonical pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Planner,
    Architect,
    Coder,
    Reviewer,
    SecurityAuditor,
    PerformanceAnalyst,
    UxReviewer,
    Tester,
    Critic,
    Refiner,
    Documenter,
}

impl AgentRole {
    /// Every role, in canonical order.
    pub const ALL: [AgentRole; 11] = [
        Self::Planner,
        Self::Architect,
        Self::Coder,
        Self::Reviewer,
        Self::SecurityAuditor,
        Self::PerformanceAnalyst,
        Self::UxReviewer,
        Self::Tester,
        Self::Critic,
        Self::Refiner,
        Self::Documenter,
    ];

    /// Position in the canonical pipeline order.
    pub fn rank(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Planner => "planner",
            Self::Architect => "architect",
            Self::Coder => "coder",
            Self::Reviewer => "reviewer",
            Self::SecurityAuditor => "security_auditor",
            Self::PerformanceAnalyst => "performance_analyst",
            Self::UxReviewer => "ux_reviewer",
            Self::Tester => "tester",
            Self::Critic => "critic",
            Self::Refiner => "refiner",
            Self::Documenter => "documenter",
        }
    }

    /// Review category this role reports under.
    pub fn category(self) -> SpecialistCategory {
        match self {
            Self::SecurityAuditor => SpecialistCategory::Security,
            Self::Architect => SpecialistCategory::Architecture,
            Self::PerformanceAnalyst => SpecialistCategory::Performance,
            Self::UxReviewer => SpecialistCategory::Ux,
            _ => SpecialistCategory::General,
        }
    }

    /// The prompt template used when an agent definition doesn't supply one.
    pub fn default_template(self) -> &'static str {
        match self {
            Self::Planner => {
                "You are {name}, the planner. Break the task into a short, ordered plan \
                 of concrete steps. Do not write the solution yet.\n\nTask: {task}\n\n{context}"
            }
            Self::Architect => {
                "You are {name}, the architect. Describe the structure the solution should \
                 have: components, boundaries, data flow, and trade-offs.\n\nTask: {task}\n\n{context}"
            }
            Self::Coder => {
                "You are {name}, the coder. Produce the complete artifact for the task, \
                 following any plan in the context.\n\nTask: {task}\n\n{context}"
            }
            Self::Reviewer => {
                "You are {name}, the reviewer. Review the latest artifact in the context \
                 and return an improved version with a short list of what changed.\n\nTask: {task}\n\n{context}"
            }
            Self::SecurityAuditor => {
                "You are {name}, a security auditor. Find vulnerabilities in the artifact.\n\
                 Reply with `SCORE: <0-100>` then one issue per line as `- [severity] message` \
                 where severity is critical, high, medium, low or info.\n\n{context}"
            }
            Self::PerformanceAnalyst => {
                "You are {name}, a performance analyst. Find performance problems in the artifact.\n\
                 Reply with `SCORE: <0-100>` then one issue per line as `- [severity] message`.\n\n{context}"
            }
            Self::UxReviewer => {
                "You are {name}, a UX reviewer. Assess usability and clarity of the artifact.\n\
                 Reply with `SCORE: <0-100>` then one issue per line as `- [severity] message`.\n\n{context}"
            }
            Self::Tester => {
                "You are {name}, the tester. Write tests for the latest artifact in the context \
                 and list any defects the tests would expose.\n\nTask: {task}\n\n{context}"
            }
            Self::Critic => {
                "You are {name}, a strict critic. Score the artifact against the task.\n\
                 Reply with `SCORE: <0-100>` on the first line, then one issue per line as \
                 `- [severity] message`.\n\nTask: {task}\n\n{context}"
            }
            Self::Refiner => {
                "You are {name}, the refiner. Rewrite the artifact so that every issue in the \
                 critique is resolved. Return only the improved artifact.\n\nTask: {task}\n\n{context}"
            }
            Self::Documenter => {
                "You are {name}, the documenter. Produce the final deliverable: the artifact \
                 from the context with clear documentation.\n\nTask: {task}\n\n{context}"
            }
        }
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AgentRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| format!("unknown agent role: {s}"))
    }
}

/// Review categories used to weight specialist scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialistCategory {
    Security,
    Architecture,
    Performance,
    Ux,
    General,
}

impl SpecialistCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Security => "security",
            Self::Architecture => "architecture",
            Self::Performance => "performance",
            Self::Ux => "ux",
            Self::General => "general",
        }
    }
}

impl std::fmt::Display for SpecialistCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable catalog entry for one specialist.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "AgentDef")]
pub struct Agent {
    pub id: String,

    pub name: String,

    pub role: AgentRole,

    /// Template with `{task}`, `{context}`, `{role}` and `{name}` placeholders
    pub prompt_template: String,

    /// Model to request; `None` uses the provider's default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_model: Option<String>,

    pub enabled: bool,
}

/// Wire form of [`Agent`]; a missing template falls back to the role default.
#[derive(Deserialize)]
struct AgentDef {
    id: String,
    name: String,
    role: AgentRole,
    #[serde(default)]
    prompt_template: Option<String>,
    #[serde(default)]
    preferred_model: Option<String>,
    #[serde(default = "default_enabled")]
    enabled: bool,
}

impl From<AgentDef> for Agent {
    fn from(def: AgentDef) -> Self {
        Self {
            prompt_template: def
                .prompt_template
                .unwrap_or_else(|| def.role.default_template().to_string()),
            id: def.id,
            name: def.name,
            role: def.role,
            preferred_model: def.preferred_model,
            enabled: def.enabled,
        }
    }
}

fn default_enabled() -> bool {
    true
}

impl Agent {
    /// Create an enabled agent using the role's default template.
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: AgentRole) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role,
            prompt_template: role.default_template().to_string(),
            preferred_model: None,
            enabled: true,
        }
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.prompt_template = template.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.preferred_model = Some(model.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Render this agent's prompt.
    ///
    /// Placeholders are substituted in one pass, so braces inside the task or
    /// context are never expanded. A template without a `{context}`
    /// placeholder gets the context appended.
    pub fn render_prompt(&self, task: &str, context: &str) -> String {
        let mut rendered =
            String::with_capacity(self.prompt_template.len() + task.len() + context.len());
        let mut has_context = false;
        let mut rest = self.prompt_template.as_str();

        while let Some(open) = rest.find('{') {
            rendered.push_str(&rest[..open]);
            let tail = &rest[open..];
            let (value, len) = if tail.starts_with("{task}") {
                (Some(task), "{task}".len())
            } else if tail.starts_with("{context}") {
                has_context = true;
                (Some(context), "{context}".len())
            } else if tail.starts_with("{name}") {
                (Some(self.name.as_str()), "{name}".len())
            } else if tail.starts_with("{role}") {
                (Some(self.role.as_str()), "{role}".len())
            } else {
                (None, 1)
            };
            match value {
                Some(value) => rendered.push_str(value),
                None => rendered.push('{'),
            }
            rest = &tail[len..];
        }
        rendered.push_str(rest);

        if has_context || context.is_empty() {
            rendered
        } else {
            format!("{rendered}\n\n{context}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_order_matches_rank() {
        for (i, role) in AgentRole::ALL.iter().enumerate() {
            assert_eq!(role.rank(), i);
        }
        assert!(AgentRole::Planner < AgentRole::Coder);
        assert!(AgentRole::Tester < AgentRole::Documenter);
    }

    #[test]
    fn role_parse_roundtrip() {
        for role in AgentRole::ALL {
            assert_eq!(role.as_str().parse::<AgentRole>().unwrap(), role);
        }
        assert!("wizard".parse::<AgentRole>().is_err());
    }

    #[test]
    fn role_categories() {
        assert_eq!(AgentRole::SecurityAuditor.category(), SpecialistCategory::Security);
        assert_eq!(AgentRole::UxReviewer.category(), SpecialistCategory::Ux);
        assert_eq!(AgentRole::Coder.category(), SpecialistCategory::General);
    }

    #[test]
    fn render_fills_placeholders() {
        let agent = Agent::new("a1", "Ada", AgentRole::Coder)
            .with_template("{name}/{role}: {task} | {context}");
        assert_eq!(
            agent.render_prompt("sort a list", "prior notes"),
            "Ada/coder: sort a list | prior notes"
        );
    }

    #[test]
    fn render_appends_context_without_placeholder() {
        let agent = Agent::new("a1", "Ada", AgentRole::Coder).with_template("Do {task}");
        assert_eq!(agent.render_prompt("x", "ctx"), "Do x\n\nctx");
        assert_eq!(agent.render_prompt("x", ""), "Do x");
    }

    #[test]
    fn agent_deserializes_enabled_by_default() {
        let agent: Agent = serde_json::from_str(
            r#"{"id":"t","name":"T","role":"tester","prompt_template":"{task}"}"#,
        )
        .unwrap();
        assert!(agent.enabled);
        assert_eq!(agent.role, AgentRole::Tester);
    }

    #[test]
    fn missing_template_falls_back_to_role_default() {
        let agent: Agent =
            serde_json::from_str(r#"{"id":"t","name":"T","role":"tester"}"#).unwrap();
        assert_eq!(agent.prompt_template, AgentRole::Tester.default_template());
        assert!(agent.render_prompt("check parser", "").contains("check parser"));
    }

    #[test]
    fn placeholders_in_task_are_left_alone() {
        let agent = Agent::new("c", "Coder", AgentRole::Coder)
            .with_template("{name}: {task}\n{context}");
        let prompt = agent.render_prompt("print {context} and {name} and {role}", "CTX");
        assert_eq!(prompt, "Coder: print {context} and {name} and {role}\nCTX");
    }

    #[test]
    fn placeholders_in_task_do_not_suppress_context_append() {
        let agent = Agent::new("c", "Coder", AgentRole::Coder).with_template("Do {task}");
        let prompt = agent.render_prompt("format {context}", "CTX");
        assert_eq!(prompt, "Do format {context}\n\nCTX");
    }

    #[test]
    fn unknown_braces_pass_through() {
        let agent = Agent::new("c", "Coder", AgentRole::Coder).with_template("fn f() {{ }} {task}");
        assert_eq!(agent.render_prompt("x", ""), "fn f() {{ }} x");
    }
}
