//! Drover Runtime Library
//!
//! The autonomous agent runtime: a state-machine-driven coordinator that
//! listens to heterogeneous triggers, plans work against a goal, gates
//! every task through policy, executes approved tasks with retry and
//! timeout semantics, and persists interaction history.

/// Agent lifecycle and event coordination module
pub mod agent;

/// Configuration management module
pub mod config;

/// Task execution module
pub mod executor;

/// Append-only interaction memory module
pub mod memory;

/// Goal planning module
pub mod planner;

/// Permission, limit, and safety-rule policy module
pub mod policy;

/// Telemetry and observability
pub mod telemetry;

/// Trigger system module
pub mod trigger;

// Re-export the primary runtime surface
pub use agent::{Agent, AgentIdentity, AgentStatus};
pub use executor::{Executor, ExecutorConfig, TaskContext, TaskHandler};
pub use memory::{InMemoryBackend, JsonlBackend, MemoryStore};
pub use planner::{GenerationPlanner, PlanRule, Planner, RulePlanner};
pub use policy::PolicyEngine;
pub use trigger::{
    ChainEventConfig, ChainEventTrigger, IntervalConfig, IntervalTrigger, Trigger, TriggerCallback,
    TriggerEvent, WebhookConfig, WebhookTrigger,
};
