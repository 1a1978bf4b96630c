//! The swarm engine — specialist pipelines over the provider gateway.
//!
//! A request flows through:
//!
//! 1. **Admission**: input validation, then one token from the user's bucket
//! 2. **Context**: file contents plus retrieved memory
//! 3. **Orchestration**: registry agents run in canonical order, each one's
//!    output feeding the next; failed agents are recorded and skipped
//! 4. **Convergence** (when more than one iteration is allowed): critique,
//!    score, refine, until the threshold or the iteration cap
//!
//! Reviews fan out to a specialist panel instead and merge the scored
//! reports with the [`ReportAggregator`].

pub mod aggregator;
pub mod convergence;
pub mod critique;
pub mod engine;
pub mod orchestrator;
pub mod registry;

#[cfg(test)]
mod test_helpers;

pub use aggregator::{AggregateReport, ReportAggregator};
pub use convergence::{
    ConvergenceController, ConvergenceOutcome, Critic, LlmCritic, PipelineRefiner, Refiner,
};
pub use critique::{Critique, parse_critique, parse_report};
pub use engine::{ReviewOutcome, SwarmEngine, SwarmOutcome};
pub use orchestrator::{PipelineOutcome, StepOutcome, SwarmOrchestrator};
pub use registry::{AgentRegistry, ConvergenceRoles};
