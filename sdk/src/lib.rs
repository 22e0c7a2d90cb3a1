//! Drover SDK
//!
//! Shared library providing traits, types, and errors for Drover components.
//! This crate is used by the runtime and by callers that register task
//! handlers or supply collaborator implementations (contract bindings,
//! text-generation clients, persistence backends).

/// Collaborator traits and their record types
pub mod collaborators;

/// Error types and handling
pub mod errors;

/// Core task, trigger, and memory types
pub mod types;

// Re-export commonly used types
pub use collaborators::{
    AgentRecord, ChainEvents, ContractExecutor, ContractRegistry, ExecutionEntry, ExecutionLog,
    ExecutionReceipt, Generation, GenerationOptions, MemoryBackend, Message, MessageRole,
    TextGenerator, TokenUsage,
};
pub use errors::{AgentError, AgentErrorExt};
pub use types::{
    AgentState, ChainLog, MemoryRecord, RecordKind, TaskDescriptor, TaskResult, TaskStatus,
};
