//! Core task, trigger, and memory types
//!
//! These types cross the boundary between the runtime and its callers:
//! planners produce `TaskDescriptor`s, the executor produces `TaskResult`s,
//! and the memory store persists `MemoryRecord`s. All of them serialize to
//! JSON so they can be logged, stored, and fed back into prompts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// A single unit of planned work
///
/// Produced by a planner, gated by the policy engine, and dispatched to the
/// handler registered for its `task_type`. Descriptors are immutable once
/// produced; their order in a plan is significant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskDescriptor {
    /// Handler type this task dispatches to (e.g. "check_balance")
    #[serde(rename = "type")]
    pub task_type: String,

    /// Handler-specific parameters
    #[serde(default)]
    pub params: serde_json::Map<String, Value>,
}

impl TaskDescriptor {
    /// Create a new task descriptor with empty parameters
    pub fn new(task_type: impl Into<String>) -> Self {
        Self {
            task_type: task_type.into(),
            params: serde_json::Map::new(),
        }
    }

    /// Add a parameter, consuming and returning the descriptor
    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }
}

/// Outcome classification for a single task
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// The handler completed and returned data
    Success,
    /// The handler failed after all retries, timed out, was unknown, or
    /// was rejected by policy
    Failure,
}

/// The outcome of one task descriptor
///
/// `execute_all` returns exactly one result per descriptor, in descriptor
/// order, regardless of individual success or failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    /// Success or failure
    pub status: TaskStatus,

    /// Data returned by the handler (JSON null on failure)
    pub data: Value,

    /// Error message when status is Failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Number of handler invocations consumed. Zero when the task never
    /// reached a handler (unknown type, policy rejection).
    pub attempts: u32,
}

impl TaskResult {
    /// Create a success result
    pub fn success(data: Value, attempts: u32) -> Self {
        Self {
            status: TaskStatus::Success,
            data,
            error: None,
            attempts,
        }
    }

    /// Create a failure result
    pub fn failure(error: impl Into<String>, attempts: u32) -> Self {
        Self {
            status: TaskStatus::Failure,
            data: Value::Null,
            error: Some(error.into()),
            attempts,
        }
    }

    /// True if the task succeeded
    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Success
    }
}

/// A decoded on-chain log record delivered by a chain-event subscription
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChainLog {
    /// Contract handle the log was emitted from
    pub contract: String,

    /// Event name (e.g. "TaskCreated")
    pub event: String,

    /// Decoded event arguments, indexed and non-indexed alike
    #[serde(default)]
    pub args: serde_json::Map<String, Value>,

    /// Block the log landed in
    pub block_number: u64,

    /// Position of the log within the block
    pub log_index: u64,

    /// Transaction hash that produced the log
    pub tx_hash: String,
}

/// Direction of a memory record
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// Something the agent observed (trigger payload, goal)
    Input,
    /// Something the agent produced (execution summary)
    Output,
}

/// One append-only record of agent interaction history
///
/// Records are never mutated after creation. Eviction, if any, is the
/// backend's documented configuration, never a silent drop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Unique record ID
    pub id: Uuid,

    /// Input or output
    pub kind: RecordKind,

    /// Record body
    pub content: String,

    /// Arbitrary caller-supplied annotations
    #[serde(default)]
    pub metadata: serde_json::Map<String, Value>,

    /// Creation time
    pub timestamp: DateTime<Utc>,
}

impl MemoryRecord {
    /// Create an input record stamped with the current time
    pub fn input(content: impl Into<String>, metadata: serde_json::Map<String, Value>) -> Self {
        Self::new(RecordKind::Input, content, metadata)
    }

    /// Create an output record stamped with the current time
    pub fn output(content: impl Into<String>, metadata: serde_json::Map<String, Value>) -> Self {
        Self::new(RecordKind::Output, content, metadata)
    }

    fn new(
        kind: RecordKind,
        content: impl Into<String>,
        metadata: serde_json::Map<String, Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            content: content.into(),
            metadata,
            timestamp: Utc::now(),
        }
    }
}

/// Lifecycle state of an agent
///
/// Exactly one agent instance holds exactly one current state at a time.
/// `Stopped` is terminal: a stopped agent cannot be restarted, a new agent
/// must be constructed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AgentState {
    /// Constructed, not yet started
    Created,
    /// Triggers active, events dispatched
    Running,
    /// Triggers alive, fired events suppressed
    Paused,
    /// Terminal: triggers released, no further dispatch
    Stopped,
    /// Unrecoverable trigger-dispatch fault; must be stopped and replaced
    Error,
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentState::Created => write!(f, "created"),
            AgentState::Running => write!(f, "running"),
            AgentState::Paused => write!(f, "paused"),
            AgentState::Stopped => write!(f, "stopped"),
            AgentState::Error => write!(f, "error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_task_descriptor_builder() {
        let task = TaskDescriptor::new("execute_trade")
            .with_param("pair", json!("ETH/USDC"))
            .with_param("amount", json!(50));

        assert_eq!(task.task_type, "execute_trade");
        assert_eq!(task.params.get("pair"), Some(&json!("ETH/USDC")));
        assert_eq!(task.params.get("amount"), Some(&json!(50)));
    }

    #[test]
    fn test_task_descriptor_serde_uses_type_field() {
        let task = TaskDescriptor::new("check_balance");
        let json = serde_json::to_string(&task).unwrap();
        assert!(json.contains(r#""type":"check_balance"#));

        let parsed: TaskDescriptor = serde_json::from_str(r#"{"type":"send"}"#).unwrap();
        assert_eq!(parsed.task_type, "send");
        assert!(parsed.params.is_empty());
    }

    #[test]
    fn test_task_result_constructors() {
        let ok = TaskResult::success(json!({"balance": 12}), 1);
        assert!(ok.is_success());
        assert_eq!(ok.attempts, 1);
        assert_eq!(ok.error, None);

        let failed = TaskResult::failure("boom", 3);
        assert!(!failed.is_success());
        assert_eq!(failed.error.as_deref(), Some("boom"));
        assert_eq!(failed.data, Value::Null);
    }

    #[test]
    fn test_memory_record_unique_ids() {
        let a = MemoryRecord::input("one", serde_json::Map::new());
        let b = MemoryRecord::input("two", serde_json::Map::new());
        assert_ne!(a.id, b.id);
        assert_eq!(a.kind, RecordKind::Input);
    }

    #[test]
    fn test_agent_state_display() {
        assert_eq!(AgentState::Created.to_string(), "created");
        assert_eq!(AgentState::Error.to_string(), "error");
    }
}
