//! Agent registry — the ordered catalog of specialists a swarm runs.
//!
//! The registry is read-only once built. Ordering comes from
//! [`AgentRole::rank`], so a new role slots into every pipeline without the
//! orchestrator knowing about it.

use std::collections::HashSet;
use swarmforge_core::agent::{Agent, AgentRole};
use swarmforge_core::error::{Error, Result};

#[derive(Debug, Clone, Default)]
pub struct AgentRegistry {
    agents: Vec<Agent>,
}

/// Agents split by the part they play in a convergence loop.
#[derive(Debug)]
pub struct ConvergenceRoles<'a> {
    /// Agents that produce the first artifact
    pub pipeline: Vec<&'a Agent>,
    pub critic: Agent,
    pub refiners: Vec<Agent>,
}

impl AgentRegistry {
    pub fn new(agents: Vec<Agent>) -> Self {
        Self { agents }
    }

    /// Build a registry from `[[agents]]` config entries.
    ///
    /// Ids must be non-empty and unique.
    pub fn from_definitions(definitions: &[Agent]) -> Result<Self> {
        let mut seen = HashSet::new();
        for agent in definitions {
            if agent.id.trim().is_empty() {
                return Err(Error::Config {
                    message: format!("agent '{}' has an empty id", agent.name),
                });
            }
            if !seen.insert(agent.id.as_str()) {
                return Err(Error::Config {
                    message: format!("duplicate agent id '{}'", agent.id),
                });
            }
        }
        Ok(Self::new(definitions.to_vec()))
    }

    /// planner → coder → reviewer → tester → documenter
    pub fn code_pipeline() -> Self {
        Self::new(vec![
            Agent::new("planner", "Planner", AgentRole::Planner),
            Agent::new("coder", "Coder", AgentRole::Coder),
            Agent::new("reviewer", "Reviewer", AgentRole::Reviewer),
            Agent::new("tester", "Tester", AgentRole::Tester),
            Agent::new("documenter", "Documenter", AgentRole::Documenter),
        ])
    }

    /// coder → critic → refiner
    pub fn critique_pipeline() -> Self {
        Self::new(vec![
            Agent::new("coder", "Coder", AgentRole::Coder),
            Agent::new("critic", "Critic", AgentRole::Critic),
            Agent::new("refiner", "Refiner", AgentRole::Refiner),
        ])
    }

    /// Parallel specialists for artifact review.
    pub fn review_panel() -> Self {
        Self::new(vec![
            Agent::new("security", "Security Auditor", AgentRole::SecurityAuditor),
            Agent::new("architecture", "Architect", AgentRole::Architect),
            Agent::new("performance", "Performance Analyst", AgentRole::PerformanceAnalyst),
            Agent::new("ux", "UX Reviewer", AgentRole::UxReviewer),
        ])
    }

    /// A preset by name: `code`, `critique` or `review`.
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "code" => Some(Self::code_pipeline()),
            "critique" => Some(Self::critique_pipeline()),
            "review" => Some(Self::review_panel()),
            _ => None,
        }
    }

    /// Enabled agents in canonical role order. Agents sharing a role keep
    /// their registration order.
    pub fn agents_in_order(&self) -> Vec<&Agent> {
        let mut agents: Vec<&Agent> = self.agents.iter().filter(|a| a.enabled).collect();
        agents.sort_by_key(|a| a.role.rank());
        agents
    }

    pub fn by_id(&self, id: &str) -> Option<&Agent> {
        self.agents.iter().find(|a| a.id == id)
    }

    /// Every registered agent, enabled or not, in registration order.
    pub fn all(&self) -> &[Agent] {
        &self.agents
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Split the enabled agents for a critique→refine loop.
    ///
    /// Critic and refiner agents are taken out of the generation pipeline.
    /// A registry without them gets default ones.
    pub fn convergence_roles(&self) -> ConvergenceRoles<'_> {
        let ordered = self.agents_in_order();

        let critic = ordered
            .iter()
            .find(|a| a.role == AgentRole::Critic)
            .map(|a| (*a).clone())
            .unwrap_or_else(|| Agent::new("critic", "Critic", AgentRole::Critic));

        let mut refiners: Vec<Agent> = ordered
            .iter()
            .filter(|a| a.role == AgentRole::Refiner)
            .map(|a| (*a).clone())
            .collect();
        if refiners.is_empty() {
            refiners.push(Agent::new("refiner", "Refiner", AgentRole::Refiner));
        }

        let pipeline = ordered
            .into_iter()
            .filter(|a| !matches!(a.role, AgentRole::Critic | AgentRole::Refiner))
            .collect();

        ConvergenceRoles {
            pipeline,
            critic,
            refiners,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(agents: &[&Agent]) -> Vec<String> {
        agents.iter().map(|a| a.id.clone()).collect()
    }

    #[test]
    fn orders_by_role_rank() {
        let registry = AgentRegistry::new(vec![
            Agent::new("docs", "Docs", AgentRole::Documenter),
            Agent::new("code", "Code", AgentRole::Coder),
            Agent::new("plan", "Plan", AgentRole::Planner),
        ]);
        assert_eq!(ids(&registry.agents_in_order()), vec!["plan", "code", "docs"]);
    }

    #[test]
    fn same_role_keeps_registration_order() {
        let registry = AgentRegistry::new(vec![
            Agent::new("coder-b", "B", AgentRole::Coder),
            Agent::new("plan", "Plan", AgentRole::Planner),
            Agent::new("coder-a", "A", AgentRole::Coder),
        ]);
        assert_eq!(ids(&registry.agents_in_order()), vec!["plan", "coder-b", "coder-a"]);
    }

    #[test]
    fn disabled_agents_are_skipped_but_still_found_by_id() {
        let registry = AgentRegistry::new(vec![
            Agent::new("plan", "Plan", AgentRole::Planner).disabled(),
            Agent::new("code", "Code", AgentRole::Coder),
        ]);
        assert_eq!(ids(&registry.agents_in_order()), vec!["code"]);
        assert!(registry.by_id("plan").is_some());
        assert!(registry.by_id("missing").is_none());
    }

    #[test]
    fn code_pipeline_order() {
        let registry = AgentRegistry::code_pipeline();
        assert_eq!(
            ids(&registry.agents_in_order()),
            vec!["planner", "coder", "reviewer", "tester", "documenter"]
        );
    }

    #[test]
    fn presets_by_name() {
        assert_eq!(AgentRegistry::preset("critique").unwrap().len(), 3);
        assert_eq!(AgentRegistry::preset("review").unwrap().len(), 4);
        assert!(AgentRegistry::preset("graph").is_none());
    }

    #[test]
    fn from_definitions_rejects_duplicates() {
        let defs = vec![
            Agent::new("a", "A", AgentRole::Coder),
            Agent::new("a", "A again", AgentRole::Tester),
        ];
        assert!(matches!(
            AgentRegistry::from_definitions(&defs),
            Err(Error::Config { .. })
        ));
        assert!(AgentRegistry::from_definitions(&defs[..1]).is_ok());
    }

    #[test]
    fn convergence_roles_split_critique_pipeline() {
        let registry = AgentRegistry::critique_pipeline();
        let roles = registry.convergence_roles();
        assert_eq!(ids(&roles.pipeline), vec!["coder"]);
        assert_eq!(roles.critic.id, "critic");
        assert_eq!(roles.refiners.len(), 1);
    }

    #[test]
    fn convergence_roles_fill_in_defaults() {
        let registry = AgentRegistry::code_pipeline();
        let roles = registry.convergence_roles();
        assert_eq!(roles.pipeline.len(), 5);
        assert_eq!(roles.critic.role, AgentRole::Critic);
        assert_eq!(roles.refiners[0].role, AgentRole::Refiner);
    }
}
