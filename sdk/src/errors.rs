//! Error types and handling
//!
//! This module provides the error taxonomy used throughout the Drover
//! runtime. Callers must be able to distinguish three situations that are
//! deliberately separate variants: the plan could not be produced
//! (`PlanParse`), a specific task failed (captured inside its `TaskResult`,
//! never raised from `execute_all`), and the agent itself has faulted and
//! must be replaced (`TriggerFault`, surfaced via the error callback).
//!
//! All errors implement the `AgentErrorExt` trait which provides
//! user-facing hints and indicates whether errors are recoverable.

use crate::types::AgentState;
use thiserror::Error;

/// Trait for Drover error extensions
///
/// Provides additional context for errors: a hint safe to show to end
/// users, and whether the condition can be retried or worked around.
pub trait AgentErrorExt {
    /// Returns a user-friendly hint for the error
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors can be retried or worked around. Non-recoverable
    /// errors require the agent to be stopped and replaced.
    fn is_recoverable(&self) -> bool;
}

/// Main runtime error type
#[derive(Debug, Error)]
pub enum AgentError {
    // Lifecycle errors
    #[error("agent not initialized: initialize() must succeed before start()")]
    NotInitialized,

    #[error("invalid state transition: {action}() is not valid from state '{from}'")]
    InvalidStateTransition {
        from: AgentState,
        action: &'static str,
    },

    // Planner errors
    #[error("plan output could not be parsed: {0}")]
    PlanParse(String),

    // Executor errors
    #[error("no handler registered for task type '{0}'")]
    UnknownTaskType(String),

    // Policy errors
    #[error("policy violation for task '{task_type}': {reason}")]
    PolicyViolation { task_type: String, reason: String },

    // Trigger errors
    #[error("trigger fault: {0}")]
    TriggerFault(String),

    // External collaborator errors
    #[error("collaborator error: {0}")]
    Collaborator(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    // Generic IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl AgentErrorExt for AgentError {
    fn user_hint(&self) -> &str {
        match self {
            Self::NotInitialized => "Call initialize() with registry and executor collaborators",
            Self::InvalidStateTransition { .. } => {
                "Check the agent state before calling lifecycle operations"
            }
            Self::PlanParse(_) => "The planner output was malformed. Retry or adjust the goal",
            Self::UnknownTaskType(_) => "Register a handler for this task type before executing",
            Self::PolicyViolation { .. } => "The task was rejected by policy and not executed",
            Self::TriggerFault(_) => "The agent has faulted. Stop it and construct a new one",
            Self::Collaborator(_) => "An external collaborator failed. Check its connectivity",
            Self::Config(_) => "Check your config.toml file for errors",
            Self::Io(_) => "File system operation failed",
        }
    }

    fn is_recoverable(&self) -> bool {
        // A trigger fault poisons the agent; everything else can be retried
        // against the same instance.
        !matches!(self, Self::TriggerFault(_))
    }
}
