//! Task execution
//!
//! Runs ordered task descriptors against registered handlers, applying
//! per-attempt timeouts, fixed-delay retries, optional bounded
//! parallelism, and dry-run. `execute_all` always returns one result per
//! descriptor, in descriptor order, and never aborts remaining tasks when
//! an earlier one fails: each task's outcome is independent and must be
//! reported.

use futures::stream::{self, StreamExt};
use sdk::errors::AgentError;
use sdk::types::{TaskDescriptor, TaskResult};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

/// Executor tuning
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Retries after the first failed attempt
    pub max_retries: u32,

    /// Fixed delay between attempts
    pub retry_delay: Duration,

    /// Per-attempt handler timeout
    pub timeout: Duration,

    /// Run tasks concurrently instead of strictly in input order
    pub parallel: bool,

    /// Upper bound on in-flight handlers when parallel is enabled.
    /// Unbounded fan-out against rate-limited collaborators is the
    /// failure mode this guards against.
    pub max_concurrency: usize,

    /// Ask handlers to skip real side effects. Handlers are responsible
    /// for honoring the flag; the executor still invokes them.
    pub dry_run: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_delay: Duration::from_millis(500),
            timeout: Duration::from_secs(30),
            parallel: false,
            max_concurrency: 4,
            dry_run: false,
        }
    }
}

/// Per-invocation context handed to a handler
#[derive(Debug, Clone)]
pub struct TaskContext {
    /// True when no real side effect should occur
    pub dry_run: bool,

    /// 1-based attempt number for this invocation
    pub attempt: u32,
}

/// An action implementation registered for a task type
#[async_trait::async_trait]
pub trait TaskHandler: Send + Sync {
    /// Perform the task and return its data
    async fn handle(&self, task: &TaskDescriptor, ctx: &TaskContext) -> anyhow::Result<Value>;
}

/// Adapter so plain async closures can be registered as handlers
struct FnHandler<F> {
    f: F,
}

#[async_trait::async_trait]
impl<F, Fut> TaskHandler for FnHandler<F>
where
    F: Fn(TaskDescriptor, TaskContext) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = anyhow::Result<Value>> + Send,
{
    async fn handle(&self, task: &TaskDescriptor, ctx: &TaskContext) -> anyhow::Result<Value> {
        (self.f)(task.clone(), ctx.clone()).await
    }
}

/// Runs task descriptors against registered action handlers
pub struct Executor {
    handlers: RwLock<HashMap<String, Arc<dyn TaskHandler>>>,
    config: ExecutorConfig,
}

impl Executor {
    /// Create an executor with the given configuration and no handlers
    pub fn new(config: ExecutorConfig) -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// The active configuration
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Register (or replace) the handler for a task type
    pub fn register_handler(&self, task_type: impl Into<String>, handler: Arc<dyn TaskHandler>) {
        let task_type = task_type.into();
        debug!("Registering handler for task type '{}'", task_type);
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        handlers.insert(task_type, handler);
    }

    /// Register an async closure as the handler for a task type
    pub fn register_fn<F, Fut>(&self, task_type: impl Into<String>, f: F)
    where
        F: Fn(TaskDescriptor, TaskContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.register_handler(task_type, Arc::new(FnHandler { f }));
    }

    /// True if a handler is registered for the task type
    pub fn has_handler(&self, task_type: &str) -> bool {
        let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
        handlers.contains_key(task_type)
    }

    /// Execute every task and return one result per task, in input order
    ///
    /// Never returns an error: per-task failures (unknown type, handler
    /// errors, timeouts) are captured in that task's result. When
    /// `parallel` is enabled, at most `max_concurrency` handlers run at
    /// once and results are still yielded in input order.
    pub async fn execute_all(&self, tasks: &[TaskDescriptor]) -> Vec<TaskResult> {
        if tasks.is_empty() {
            return Vec::new();
        }

        if self.config.parallel {
            stream::iter(tasks.to_vec())
                .map(|task| async move { self.execute_task(&task).await })
                .buffered(self.config.max_concurrency.max(1))
                .collect()
                .await
        } else {
            let mut results = Vec::with_capacity(tasks.len());
            for task in tasks {
                results.push(self.execute_task(task).await);
            }
            results
        }
    }

    /// Execute one task with retry and timeout
    async fn execute_task(&self, task: &TaskDescriptor) -> TaskResult {
        let handler = {
            let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
            handlers.get(&task.task_type).cloned()
        };

        let Some(handler) = handler else {
            warn!("No handler registered for task type '{}'", task.task_type);
            return TaskResult::failure(
                AgentError::UnknownTaskType(task.task_type.clone()).to_string(),
                0,
            );
        };

        let total_attempts = self.config.max_retries + 1;
        let mut last_error = String::new();

        for attempt in 1..=total_attempts {
            let ctx = TaskContext {
                dry_run: self.config.dry_run,
                attempt,
            };

            match timeout(self.config.timeout, handler.handle(task, &ctx)).await {
                Ok(Ok(data)) => {
                    debug!(
                        "Task '{}' succeeded on attempt {}/{}",
                        task.task_type, attempt, total_attempts
                    );
                    return TaskResult::success(data, attempt);
                }
                Ok(Err(e)) => {
                    warn!(
                        "Task '{}' attempt {}/{} failed: {}",
                        task.task_type, attempt, total_attempts, e
                    );
                    last_error = e.to_string();
                }
                Err(_) => {
                    warn!(
                        "Task '{}' attempt {}/{} timed out after {:?}",
                        task.task_type, attempt, total_attempts, self.config.timeout
                    );
                    last_error = format!("handler timed out after {:?}", self.config.timeout);
                }
            }

            if attempt < total_attempts {
                sleep(self.config.retry_delay).await;
            }
        }

        TaskResult::failure(last_error, total_attempts)
    }
}
