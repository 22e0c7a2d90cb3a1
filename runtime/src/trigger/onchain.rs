//! On-chain event trigger
//!
//! Subscribes to a named event on a contract handle through the
//! `ChainEvents` collaborator, optionally filtered by decoded argument
//! values, and forwards each matching log to the callback in chain log
//! order. Delivery is best-effort, at-most-once per connection: missed
//! events are not replayed across reconnects.

use crate::trigger::{Result, Trigger, TriggerCallback, TriggerEvent};
use async_trait::async_trait;
use sdk::collaborators::ChainEvents;
use sdk::errors::AgentError;
use sdk::types::ChainLog;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// On-chain trigger configuration
#[derive(Debug, Clone)]
pub struct ChainEventConfig {
    /// Contract handle to watch
    pub contract: String,

    /// Event name to subscribe to
    pub event: String,

    /// Argument values a log must carry to be delivered; empty matches
    /// every log of the event
    pub filters: serde_json::Map<String, Value>,
}

impl ChainEventConfig {
    /// Watch `event` on `contract` with no argument filter
    pub fn new(contract: impl Into<String>, event: impl Into<String>) -> Self {
        Self {
            contract: contract.into(),
            event: event.into(),
            filters: serde_json::Map::new(),
        }
    }

    /// Require an argument value for a log to be delivered
    pub fn filter(mut self, arg: impl Into<String>, value: Value) -> Self {
        self.filters.insert(arg.into(), value);
        self
    }
}

/// Trigger driven by a chain-event subscription collaborator
pub struct ChainEventTrigger {
    source: Arc<dyn ChainEvents>,
    config: ChainEventConfig,
    handle: Option<JoinHandle<()>>,
    stopping: Arc<AtomicBool>,
}

impl ChainEventTrigger {
    pub fn new(source: Arc<dyn ChainEvents>, config: ChainEventConfig) -> Self {
        Self {
            source,
            config,
            handle: None,
            stopping: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// True iff every configured filter value matches the log's arguments
fn matches_filters(log: &ChainLog, filters: &serde_json::Map<String, Value>) -> bool {
    filters
        .iter()
        .all(|(arg, expected)| log.args.get(arg) == Some(expected))
}

#[async_trait]
impl Trigger for ChainEventTrigger {
    fn kind(&self) -> &'static str {
        "chain"
    }

    async fn start(&mut self, callback: TriggerCallback) -> Result<()> {
        if self.handle.is_some() {
            return Err(AgentError::TriggerFault(
                "chain event trigger already started".to_string(),
            ));
        }

        let mut rx = self
            .source
            .subscribe(&self.config.contract, &self.config.event)
            .await
            .map_err(|e| {
                AgentError::TriggerFault(format!(
                    "failed to subscribe to {}::{}: {}",
                    self.config.contract, self.config.event, e
                ))
            })?;

        let filters = self.config.filters.clone();
        let contract = self.config.contract.clone();
        let event = self.config.event.clone();
        let stopping = Arc::clone(&self.stopping);

        let handle = tokio::spawn(async move {
            while let Some(log) = rx.recv().await {
                if !matches_filters(&log, &filters) {
                    debug!(
                        "Dropping {}::{} log at block {}: filter mismatch",
                        contract, event, log.block_number
                    );
                    continue;
                }
                callback(TriggerEvent::Chain(log)).await;
            }

            // Channel closed without stop(): the subscription dropped out
            // from under us.
            if !stopping.load(Ordering::SeqCst) {
                warn!("Subscription to {}::{} closed unexpectedly", contract, event);
                callback(TriggerEvent::Fault(format!(
                    "chain event subscription to {}::{} closed",
                    contract, event
                )))
                .await;
            }
        });

        self.handle = Some(handle);
        Ok(())
    }

    async fn stop(&mut self) {
        self.stopping.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!(
                "Chain event trigger for {}::{} stopped",
                self.config.contract, self.config.event
            );
        }
    }
}

impl Drop for ChainEventTrigger {
    fn drop(&mut self) {
        self.stopping.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
