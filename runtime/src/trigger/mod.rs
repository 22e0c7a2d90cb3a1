//! Trigger system
//!
//! Independent event sources that invoke a callback when they fire. All
//! variants implement the same capability, `{ start(callback), stop() }`,
//! and each instance owns its own timer, subscription, or listener: the
//! agent holds the triggers it created and tears them down on stop. There
//! is no process-wide registry.
//!
//! Within one trigger, events reach the callback in the order the trigger
//! observed them. Across triggers, no relative ordering is guaranteed.
//! `stop()` is idempotent and never affects other triggers.

pub mod interval;
pub mod onchain;
pub mod webhook;

pub use interval::{IntervalConfig, IntervalTrigger};
pub use onchain::{ChainEventConfig, ChainEventTrigger};
pub use webhook::{WebhookConfig, WebhookTrigger};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use sdk::errors::AgentError;
use sdk::types::ChainLog;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Result type for trigger operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Callback invoked once per fired event
///
/// The callback must be safe to run concurrently with callbacks from
/// other triggers of the same agent.
pub type TriggerCallback = Arc<dyn Fn(TriggerEvent) -> BoxFuture<'static, ()> + Send + Sync>;

/// An opaque payload produced by a trigger, consumed synchronously by the
/// agent's callback and not retained
#[derive(Debug, Clone)]
pub enum TriggerEvent {
    /// Timer fired
    Interval {
        /// 1-based execution sequence number
        sequence: u64,
        /// When the timer fired
        timestamp: DateTime<Utc>,
    },

    /// A matching on-chain log was observed
    Chain(ChainLog),

    /// A validated webhook delivery arrived
    Webhook {
        /// Parsed request body
        body: Value,
        /// Request headers
        headers: HashMap<String, String>,
    },

    /// The trigger itself faulted after startup (subscription dropped,
    /// listener died). Delivered on the same path as ordinary events so
    /// the fault always has an observer.
    Fault(String),
}

impl TriggerEvent {
    /// Short tag naming the event source, used for memory metadata
    pub fn kind(&self) -> &'static str {
        match self {
            TriggerEvent::Interval { .. } => "interval",
            TriggerEvent::Chain(_) => "chain",
            TriggerEvent::Webhook { .. } => "webhook",
            TriggerEvent::Fault(_) => "fault",
        }
    }
}

/// Uniform capability implemented by every trigger variant
#[async_trait]
pub trait Trigger: Send + Sync {
    /// Returns the trigger kind ("interval", "chain", "webhook")
    fn kind(&self) -> &'static str;

    /// Begin producing events. May block briefly while establishing a
    /// subscription or binding a listener. Starting an already-started
    /// trigger is a fault.
    async fn start(&mut self, callback: TriggerCallback) -> Result<()>;

    /// Stop producing events and release the underlying resource.
    /// Idempotent: stopping a stopped trigger is a no-op.
    async fn stop(&mut self);
}
