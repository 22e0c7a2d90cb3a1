//! Interval trigger
//!
//! Fires the callback every fixed duration, starting immediately or after
//! the first period per configuration, with an optional maximum execution
//! count after which the trigger stops itself.

use crate::trigger::{Result, Trigger, TriggerCallback, TriggerEvent};
use async_trait::async_trait;
use chrono::Utc;
use sdk::errors::AgentError;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Interval trigger configuration
#[derive(Debug, Clone)]
pub struct IntervalConfig {
    /// Time between firings
    pub period: Duration,

    /// Fire once immediately on start instead of waiting a full period
    pub fire_immediately: bool,

    /// Stop after this many firings; `None` runs until stopped
    pub max_executions: Option<u64>,
}

impl IntervalConfig {
    /// A trigger that fires every `period`, first firing after one period
    pub fn every(period: Duration) -> Self {
        Self {
            period,
            fire_immediately: false,
            max_executions: None,
        }
    }

    /// Fire once immediately on start
    pub fn immediate(mut self) -> Self {
        self.fire_immediately = true;
        self
    }

    /// Self-stop after `count` firings
    pub fn limit(mut self, count: u64) -> Self {
        self.max_executions = Some(count);
        self
    }
}

/// Timer-driven trigger
pub struct IntervalTrigger {
    config: IntervalConfig,
    handle: Option<JoinHandle<()>>,
}

impl IntervalTrigger {
    pub fn new(config: IntervalConfig) -> Self {
        Self {
            config,
            handle: None,
        }
    }
}

#[async_trait]
impl Trigger for IntervalTrigger {
    fn kind(&self) -> &'static str {
        "interval"
    }

    async fn start(&mut self, callback: TriggerCallback) -> Result<()> {
        if self.handle.is_some() {
            return Err(AgentError::TriggerFault(
                "interval trigger already started".to_string(),
            ));
        }

        let config = self.config.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(config.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            // The first tick of tokio's interval completes immediately;
            // swallow it unless the config asks to fire on start.
            if !config.fire_immediately {
                ticker.tick().await;
            }

            let mut sequence: u64 = 0;
            loop {
                ticker.tick().await;
                sequence += 1;
                callback(TriggerEvent::Interval {
                    sequence,
                    timestamp: Utc::now(),
                })
                .await;

                if let Some(max) = config.max_executions {
                    if sequence >= max {
                        debug!("Interval trigger reached {} executions, stopping", max);
                        break;
                    }
                }
            }
        });

        self.handle = Some(handle);
        Ok(())
    }

    async fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!("Interval trigger stopped");
        }
    }
}

impl Drop for IntervalTrigger {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use tokio::time::sleep;

    fn counting_callback(counter: Arc<AtomicU64>) -> TriggerCallback {
        Arc::new(move |event| {
            let counter = Arc::clone(&counter);
            Box::pin(async move {
                if let TriggerEvent::Interval { sequence, .. } = event {
                    counter.fetch_add(1, Ordering::SeqCst);
                    assert!(sequence >= 1);
                }
            })
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_limited_trigger_fires_exactly_n_times() {
        let counter = Arc::new(AtomicU64::new(0));
        let mut trigger =
            IntervalTrigger::new(IntervalConfig::every(Duration::from_millis(50)).limit(3));
        trigger.start(counting_callback(Arc::clone(&counter))).await.unwrap();

        // Far more than 3 periods; the trigger must have self-stopped
        sleep(Duration::from_secs(5)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fire_immediately_does_not_wait_a_period() {
        let counter = Arc::new(AtomicU64::new(0));
        let mut trigger =
            IntervalTrigger::new(IntervalConfig::every(Duration::from_secs(60)).immediate().limit(1));
        trigger.start(counting_callback(Arc::clone(&counter))).await.unwrap();

        sleep(Duration::from_millis(10)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_halts_firing_and_is_idempotent() {
        let counter = Arc::new(AtomicU64::new(0));
        let mut trigger = IntervalTrigger::new(IntervalConfig::every(Duration::from_millis(20)));
        trigger.start(counting_callback(Arc::clone(&counter))).await.unwrap();

        sleep(Duration::from_millis(50)).await;
        trigger.stop().await;
        let seen = counter.load(Ordering::SeqCst);
        assert!(seen >= 2);

        sleep(Duration::from_millis(200)).await;
        assert_eq!(counter.load(Ordering::SeqCst), seen);

        // Second stop is a no-op
        trigger.stop().await;
    }

    #[tokio::test]
    async fn test_double_start_is_a_fault() {
        let counter = Arc::new(AtomicU64::new(0));
        let mut trigger = IntervalTrigger::new(IntervalConfig::every(Duration::from_secs(60)));
        trigger.start(counting_callback(Arc::clone(&counter))).await.unwrap();

        let err = trigger
            .start(counting_callback(counter))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::TriggerFault(_)));
        trigger.stop().await;
    }
}
