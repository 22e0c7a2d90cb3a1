//! Collaborator traits and their record types
//!
//! The runtime never talks to a blockchain node, an LLM HTTP API, or a
//! durable store directly. Every external system is expressed as one of the
//! traits below and supplied by the caller at wiring time. All traits are
//! object-safe and `Send + Sync` so implementations can be shared across
//! trigger callbacks.

use crate::errors::AgentError;
use crate::types::{ChainLog, MemoryRecord, TaskResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Result type for collaborator operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// On-chain agent registration record, as read from the registry contract
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRecord {
    /// On-chain agent ID
    pub id: String,

    /// Registered display name
    pub name: String,

    /// Owner address
    pub owner: String,

    /// Content URI for off-chain agent metadata
    pub metadata_uri: String,

    /// Whether the registration is active
    pub active: bool,
}

/// Receipt returned by the contract executor for a submitted task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReceipt {
    /// Task ID the receipt belongs to
    pub task_id: String,

    /// Transaction hash of the execution call
    pub tx_hash: String,

    /// Whether the call succeeded on chain
    pub success: bool,
}

/// Contract registry reader, consulted during `Agent::initialize`
#[async_trait]
pub trait ContractRegistry: Send + Sync {
    /// Look up an agent registration by its on-chain ID
    async fn get_agent(&self, agent_id: &str) -> Result<AgentRecord>;
}

/// Contract executor writer
///
/// Invoked by task handlers that the caller registers with the executor;
/// the runtime itself never submits blockchain writes.
#[async_trait]
pub trait ContractExecutor: Send + Sync {
    /// Submit a task execution and return its receipt
    async fn execute(&self, task_id: &str) -> Result<ExecutionReceipt>;
}

/// Message in a generation conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Role of the message sender
    pub role: MessageRole,

    /// Content of the message
    pub content: String,
}

impl Message {
    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User message
    User,
    /// Assistant message
    Assistant,
    /// System message
    System,
}

/// Tuning options for a generation call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// Token accounting for a generation call
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens consumed by the prompt
    pub prompt_tokens: u32,

    /// Tokens produced in the completion
    pub completion_tokens: u32,
}

/// A completed generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generation {
    /// Generated text
    pub content: String,

    /// Token usage for the call
    #[serde(default)]
    pub usage: TokenUsage,
}

/// Text-generation collaborator
///
/// Used by the generation-backed planner and by caller-supplied handlers.
/// Calls may block for the duration of the external request; callers must
/// treat the output as untrusted input requiring policy checks.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Returns the name of the generator (e.g. "anthropic", "ollama")
    fn name(&self) -> &str;

    /// Generate a completion for the given conversation
    async fn generate(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<Generation>;
}

/// Persistence backend for the memory store
///
/// File-backed and in-process implementations must satisfy identical
/// ordering semantics: `read_all` returns records in append order.
#[async_trait]
pub trait MemoryBackend: Send + Sync {
    /// Append one record. Must be safe under concurrent callers: no torn
    /// writes, no lost records.
    async fn append(&self, record: MemoryRecord) -> Result<()>;

    /// Read every retained record in append order
    async fn read_all(&self) -> Result<Vec<MemoryRecord>>;

    /// Irreversibly drop all records
    async fn clear(&self) -> Result<()>;
}

/// Chain-event subscription source
///
/// Delivery follows the chain's log order. No replay of missed events is
/// guaranteed across reconnects: at-most-once per connection.
#[async_trait]
pub trait ChainEvents: Send + Sync {
    /// Subscribe to a named event on a contract handle. The returned
    /// channel closes when the subscription drops.
    async fn subscribe(&self, contract: &str, event: &str) -> Result<mpsc::Receiver<ChainLog>>;
}

/// One dispatched goal with its outcomes, as handed to the execution log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionEntry {
    /// Unique dispatch ID
    pub dispatch_id: String,

    /// Goal the planner was given
    pub goal: String,

    /// Per-task outcomes, in plan order
    pub results: Vec<TaskResult>,

    /// Wall time of the dispatch
    pub duration_ms: u64,

    /// When the dispatch finished
    pub timestamp: DateTime<Utc>,
}

/// External execution log collaborator
///
/// Receives a record of every completed dispatch, after results have been
/// written to memory.
#[async_trait]
pub trait ExecutionLog: Send + Sync {
    /// Record one completed dispatch
    async fn record(&self, entry: ExecutionEntry) -> Result<()>;
}
