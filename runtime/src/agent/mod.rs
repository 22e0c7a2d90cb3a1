//! Agent lifecycle and event coordination
//!
//! The agent is constructed in `Created`, wired to its collaborators via
//! `initialize`, and moved through its lifecycle with `start`, `pause`,
//! `resume`, and `stop`. Once running, every fired trigger event flows
//! through plan → policy gate → execute → remember.

mod core;
mod lifecycle;

pub use self::core::{Agent, AgentIdentity, AgentStatus, ErrorCallback};
