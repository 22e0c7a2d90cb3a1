//! Goal planning
//!
//! A planner converts a goal/context pair into an ordered task list. Two
//! strategies ship with the runtime: a generation-backed planner that asks
//! a text-generation collaborator for a structured task list, and a
//! deterministic rule-based planner that maps goal predicates to fixed
//! action lists.

pub mod generation;
pub mod rules;

pub use generation::GenerationPlanner;
pub use rules::{PlanRule, RulePlanner};

use async_trait::async_trait;
use sdk::errors::AgentError;
use sdk::types::TaskDescriptor;

/// Result type for planning operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Converts a goal and context into an ordered task list
///
/// Order in the returned plan is significant: sequential dependency is
/// assumed unless the executor is explicitly configured for parallelism.
/// An empty plan is a valid outcome, not an error.
#[async_trait]
pub trait Planner: Send + Sync {
    /// Returns the name of the planning strategy
    fn name(&self) -> &str;

    /// Produce an ordered task list for the goal
    async fn plan(&self, goal: &str, context: &str) -> Result<Vec<TaskDescriptor>>;
}
