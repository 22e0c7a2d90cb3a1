//! Agent lifecycle state machine
//!
//! Valid edges:
//!
//! ```text
//! Created --start--> Running --pause--> Paused --resume--> Running
//! Running|Paused|Error --stop--> Stopped (terminal)
//! any non-terminal --fault--> Error
//! ```
//!
//! Invalid edges fail with `InvalidStateTransition` and leave the state
//! unchanged. No state is ever skipped.

use sdk::errors::AgentError;
use sdk::types::AgentState;

/// A caller-driven lifecycle operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LifecycleAction {
    Start,
    Pause,
    Resume,
    Stop,
}

impl LifecycleAction {
    fn name(&self) -> &'static str {
        match self {
            LifecycleAction::Start => "start",
            LifecycleAction::Pause => "pause",
            LifecycleAction::Resume => "resume",
            LifecycleAction::Stop => "stop",
        }
    }
}

/// Holds the agent's single current state and validates transitions
#[derive(Debug)]
pub(crate) struct Lifecycle {
    state: AgentState,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: AgentState::Created,
        }
    }

    /// The current state
    pub fn current(&self) -> AgentState {
        self.state
    }

    /// The state `action` would move to, without applying it
    pub fn ensure(&self, action: LifecycleAction) -> Result<AgentState, AgentError> {
        match (self.state, action) {
            (AgentState::Created, LifecycleAction::Start) => Ok(AgentState::Running),
            (AgentState::Running, LifecycleAction::Pause) => Ok(AgentState::Paused),
            (AgentState::Paused, LifecycleAction::Resume) => Ok(AgentState::Running),
            (
                AgentState::Running | AgentState::Paused | AgentState::Error,
                LifecycleAction::Stop,
            ) => Ok(AgentState::Stopped),
            (from, action) => Err(AgentError::InvalidStateTransition {
                from,
                action: action.name(),
            }),
        }
    }

    /// Apply `action`, returning the new state
    pub fn apply(&mut self, action: LifecycleAction) -> Result<AgentState, AgentError> {
        let next = self.ensure(action)?;
        self.state = next;
        Ok(next)
    }

    /// Move to `Error` from any non-terminal state. Returns false when the
    /// agent was already stopped (or already in error) and nothing changed.
    pub fn apply_fault(&mut self) -> bool {
        match self.state {
            AgentState::Stopped | AgentState::Error => false,
            _ => {
                self.state = AgentState::Error;
                true
            }
        }
    }
}
