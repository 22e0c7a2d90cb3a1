//! Agent coordinator
//!
//! The top-level unit: owns the lifecycle state machine, wires triggers to
//! the planner → policy gate → executor pipeline, and writes interaction
//! history to memory. Trigger callbacks from different sources may arrive
//! concurrently; dispatches are serialized through a single async mutex so
//! lifecycle reads and memory appends never race, and `stop()` drains the
//! in-flight dispatch instead of cancelling it.

use crate::agent::lifecycle::{Lifecycle, LifecycleAction};
use crate::executor::Executor;
use crate::memory::MemoryStore;
use crate::planner::Planner;
use crate::policy::PolicyEngine;
use crate::trigger::{Trigger, TriggerCallback, TriggerEvent};
use chrono::Utc;
use sdk::collaborators::{
    ContractExecutor, ContractRegistry, ExecutionEntry, ExecutionLog, TextGenerator,
};
use sdk::errors::AgentError;
use sdk::types::{AgentState, TaskDescriptor, TaskResult};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Result type for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Callback invoked when the agent faults or a dispatch cannot plan
pub type ErrorCallback = Arc<dyn Fn(&AgentError) + Send + Sync>;

/// Who the agent is
#[derive(Debug, Clone)]
pub struct AgentIdentity {
    /// On-chain agent ID, looked up in the registry during initialize
    pub agent_id: String,

    /// Display name; also the policy subject for permission checks
    pub name: String,

    /// What the agent is for; base goal for scheduled runs
    pub description: String,

    /// Capability tags
    pub capabilities: Vec<String>,
}

/// Snapshot of the agent for observability
#[derive(Debug, Clone)]
pub struct AgentStatus {
    /// Current lifecycle state
    pub state: AgentState,

    /// Agent display name
    pub name: String,

    /// Triggers currently owned by the agent
    pub triggers: usize,

    /// Trigger events accepted for dispatch since construction
    pub dispatches: u64,

    /// Faults observed since construction
    pub faults: u64,
}

/// Collaborators wired in by `initialize`
struct Collaborators {
    #[allow(dead_code)]
    registry: Arc<dyn ContractRegistry>,
    contract_executor: Arc<dyn ContractExecutor>,
}

/// State shared between the agent handle and its trigger callbacks
struct AgentShared {
    identity: AgentIdentity,
    lifecycle: Mutex<Lifecycle>,
    paused: AtomicBool,
    dispatch_lock: tokio::sync::Mutex<()>,
    planner: Arc<dyn Planner>,
    executor: Arc<Executor>,
    policy: Arc<PolicyEngine>,
    memory: MemoryStore,
    execution_log: RwLock<Option<Arc<dyn ExecutionLog>>>,
    error_cb: RwLock<Option<ErrorCallback>>,
    dispatches: AtomicU64,
    faults: AtomicU64,
}

/// The coordinating unit owning lifecycle state and wiring triggers to
/// planning and execution
pub struct Agent {
    shared: Arc<AgentShared>,
    triggers: Vec<Box<dyn Trigger>>,
    collaborators: Option<Collaborators>,
    generator: Option<Arc<dyn TextGenerator>>,
}

impl Agent {
    /// Construct an agent in the `Created` state
    pub fn new(
        identity: AgentIdentity,
        planner: Arc<dyn Planner>,
        executor: Arc<Executor>,
        policy: Arc<PolicyEngine>,
        memory: MemoryStore,
    ) -> Self {
        Self {
            shared: Arc::new(AgentShared {
                identity,
                lifecycle: Mutex::new(Lifecycle::new()),
                paused: AtomicBool::new(false),
                dispatch_lock: tokio::sync::Mutex::new(()),
                planner,
                executor,
                policy,
                memory,
                execution_log: RwLock::new(None),
                error_cb: RwLock::new(None),
                dispatches: AtomicU64::new(0),
                faults: AtomicU64::new(0),
            }),
            triggers: Vec::new(),
            collaborators: None,
            generator: None,
        }
    }

    /// Attach the text-generation collaborator referenced by the identity
    pub fn with_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// The attached generation collaborator, if any
    pub fn generator(&self) -> Option<Arc<dyn TextGenerator>> {
        self.generator.clone()
    }

    /// Attach the external execution log collaborator
    pub fn set_execution_log(&self, log: Arc<dyn ExecutionLog>) {
        let mut slot = self
            .shared
            .execution_log
            .write()
            .unwrap_or_else(|e| e.into_inner());
        *slot = Some(log);
    }

    /// Register the callback that observes agent faults and plan failures
    pub fn on_error(&self, callback: ErrorCallback) {
        let mut slot = self
            .shared
            .error_cb
            .write()
            .unwrap_or_else(|e| e.into_inner());
        *slot = Some(callback);
    }

    /// Wire the contract collaborators, verifying the agent's registration
    ///
    /// Must succeed before `start()`. Fails when the registry does not
    /// know the agent or reports it inactive.
    pub async fn initialize(
        &mut self,
        registry: Arc<dyn ContractRegistry>,
        contract_executor: Arc<dyn ContractExecutor>,
    ) -> Result<()> {
        let record = registry.get_agent(&self.shared.identity.agent_id).await?;
        if !record.active {
            return Err(AgentError::Collaborator(format!(
                "agent '{}' is registered but inactive",
                record.id
            )));
        }

        info!(
            "Agent '{}' initialized against registry record '{}'",
            self.shared.identity.name, record.name
        );
        self.collaborators = Some(Collaborators {
            registry,
            contract_executor,
        });
        Ok(())
    }

    /// The contract executor writer wired by `initialize`, for handler
    /// registration by the caller
    pub fn contract_executor(&self) -> Option<Arc<dyn ContractExecutor>> {
        self.collaborators
            .as_ref()
            .map(|c| Arc::clone(&c.contract_executor))
    }

    /// Register a trigger. Only valid before `start()`.
    pub fn add_trigger(&mut self, trigger: Box<dyn Trigger>) -> Result<()> {
        let state = self.state();
        if state != AgentState::Created {
            return Err(AgentError::InvalidStateTransition {
                from: state,
                action: "add_trigger",
            });
        }
        debug!(
            "Agent '{}' registered {} trigger",
            self.shared.identity.name,
            trigger.kind()
        );
        self.triggers.push(trigger);
        Ok(())
    }

    /// `Created -> Running`: activate every registered trigger
    ///
    /// Requires a prior successful `initialize`. A trigger that fails to
    /// start (a listener that cannot bind, a subscription that cannot be
    /// established) faults the agent: already-started triggers are wound
    /// back and the agent lands in `Error`.
    pub async fn start(&mut self) -> Result<()> {
        self.shared
            .lifecycle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .ensure(LifecycleAction::Start)?;
        if self.collaborators.is_none() {
            return Err(AgentError::NotInitialized);
        }

        let callback = self.make_callback();
        for i in 0..self.triggers.len() {
            if let Err(e) = self.triggers[i].start(Arc::clone(&callback)).await {
                for trigger in self.triggers[..i].iter_mut() {
                    trigger.stop().await;
                }
                self.shared.fault(format!("trigger failed to start: {}", e));
                return Err(e);
            }
        }

        self.shared.paused.store(false, Ordering::SeqCst);
        self.shared
            .lifecycle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .apply(LifecycleAction::Start)?;
        info!(
            "Agent '{}' running with {} trigger(s)",
            self.shared.identity.name,
            self.triggers.len()
        );
        Ok(())
    }

    /// `Running -> Paused`: suppress fired events without tearing anything
    /// down. In-flight dispatches are not cancelled.
    pub fn pause(&mut self) -> Result<()> {
        self.shared
            .lifecycle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .apply(LifecycleAction::Pause)?;
        self.shared.paused.store(true, Ordering::SeqCst);
        info!("Agent '{}' paused", self.shared.identity.name);
        Ok(())
    }

    /// `Paused -> Running`: re-enable event handling
    pub fn resume(&mut self) -> Result<()> {
        self.shared
            .lifecycle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .apply(LifecycleAction::Resume)?;
        self.shared.paused.store(false, Ordering::SeqCst);
        info!("Agent '{}' resumed", self.shared.identity.name);
        Ok(())
    }

    /// `Running|Paused|Error -> Stopped`: deactivate and release all
    /// triggers, then drain the in-flight dispatch. Terminal.
    pub async fn stop(&mut self) -> Result<()> {
        self.shared
            .lifecycle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .ensure(LifecycleAction::Stop)?;

        for trigger in self.triggers.iter_mut() {
            trigger.stop().await;
        }
        self.triggers.clear();

        // Graceful drain: wait for the dispatch in progress, if any
        let _guard = self.shared.dispatch_lock.lock().await;

        self.shared
            .lifecycle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .apply(LifecycleAction::Stop)?;
        info!("Agent '{}' stopped", self.shared.identity.name);
        Ok(())
    }

    /// Current lifecycle state
    pub fn state(&self) -> AgentState {
        self.shared
            .lifecycle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .current()
    }

    /// Observability snapshot
    pub fn status(&self) -> AgentStatus {
        AgentStatus {
            state: self.state(),
            name: self.shared.identity.name.clone(),
            triggers: self.triggers.len(),
            dispatches: self.shared.dispatches.load(Ordering::SeqCst),
            faults: self.shared.faults.load(Ordering::SeqCst),
        }
    }

    fn make_callback(&self) -> TriggerCallback {
        let shared = Arc::clone(&self.shared);
        Arc::new(move |event| {
            let shared = Arc::clone(&shared);
            Box::pin(async move { shared.handle_event(event).await })
        })
    }
}

impl AgentShared {
    /// Handle one fired trigger event end to end
    async fn handle_event(&self, event: TriggerEvent) {
        if let TriggerEvent::Fault(message) = &event {
            self.fault(message.clone());
            return;
        }

        // One dispatch at a time: lifecycle reads, policy gating, and
        // memory appends all happen inside this boundary.
        let _guard = self.dispatch_lock.lock().await;

        if self.paused.load(Ordering::SeqCst) {
            debug!(
                "Agent '{}' paused, suppressing {} event",
                self.identity.name,
                event.kind()
            );
            return;
        }
        let state = self
            .lifecycle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .current();
        if state != AgentState::Running {
            debug!(
                "Agent '{}' in state '{}', ignoring {} event",
                self.identity.name,
                state,
                event.kind()
            );
            return;
        }
        self.dispatches.fetch_add(1, Ordering::SeqCst);

        let started = Instant::now();
        let dispatch_id = Uuid::new_v4().to_string();
        let (goal, metadata) = self.frame_goal(&event);
        let context = self.memory.recent_context(5).await.unwrap_or_default();

        if let Err(e) = self.memory.add_input(&goal, metadata).await {
            warn!("Failed to append input record: {}", e);
        }

        let plan = match self.planner.plan(&goal, &context).await {
            Ok(plan) => plan,
            Err(e) => {
                warn!(
                    "Agent '{}' could not plan for goal '{}': {}",
                    self.identity.name, goal, e
                );
                self.report_error(&e);
                return;
            }
        };
        if plan.is_empty() {
            debug!("Empty plan for goal '{}', nothing to execute", goal);
            return;
        }

        let results = self.gate_and_execute(&plan).await;
        let succeeded = results.iter().filter(|r| r.is_success()).count();

        let mut out_meta = serde_json::Map::new();
        out_meta.insert("dispatch_id".to_string(), Value::String(dispatch_id.clone()));
        out_meta.insert(
            "results".to_string(),
            serde_json::to_value(&results).unwrap_or(Value::Null),
        );
        if let Err(e) = self
            .memory
            .add_output(
                format!(
                    "{}/{} tasks succeeded for goal '{}'",
                    succeeded,
                    results.len(),
                    goal
                ),
                out_meta,
            )
            .await
        {
            warn!("Failed to append output record: {}", e);
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        let execution_log = self
            .execution_log
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(log) = execution_log {
            let entry = ExecutionEntry {
                dispatch_id,
                goal: goal.clone(),
                results: results.clone(),
                duration_ms,
                timestamp: Utc::now(),
            };
            if let Err(e) = log.record(entry).await {
                warn!("Execution log rejected entry: {}", e);
            }
        }

        info!(
            "Agent '{}' ran {} task(s) for goal '{}' in {}ms ({} ok)",
            self.identity.name,
            results.len(),
            goal,
            duration_ms,
            succeeded
        );
    }

    /// Build the goal/context framing for an event
    fn frame_goal(&self, event: &TriggerEvent) -> (String, serde_json::Map<String, Value>) {
        let mut metadata = serde_json::Map::new();
        metadata.insert(
            "trigger".to_string(),
            Value::String(event.kind().to_string()),
        );

        let goal = match event {
            TriggerEvent::Interval { sequence, .. } => {
                metadata.insert("sequence".to_string(), Value::from(*sequence));
                let base = if self.identity.description.is_empty() {
                    "Run the agent's periodic routine"
                } else {
                    self.identity.description.as_str()
                };
                format!("{} (scheduled run #{})", base, sequence)
            }
            TriggerEvent::Chain(log) => {
                metadata.insert("block_number".to_string(), Value::from(log.block_number));
                metadata.insert("tx_hash".to_string(), Value::String(log.tx_hash.clone()));
                metadata.insert("args".to_string(), Value::Object(log.args.clone()));
                format!("Handle {} event from contract {}", log.event, log.contract)
            }
            TriggerEvent::Webhook { body, .. } => {
                metadata.insert("body".to_string(), body.clone());
                body.get("goal")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("Handle webhook delivery: {}", body))
            }
            TriggerEvent::Fault(message) => format!("Trigger fault: {}", message),
        };

        (goal, metadata)
    }

    /// Check every task against policy and run the approved ones,
    /// preserving plan order in the combined results
    async fn gate_and_execute(&self, plan: &[TaskDescriptor]) -> Vec<TaskResult> {
        let mut slots: Vec<Option<TaskResult>> = Vec::with_capacity(plan.len());
        slots.resize_with(plan.len(), || None);

        let mut approved: Vec<(usize, TaskDescriptor)> = Vec::new();
        for (i, task) in plan.iter().enumerate() {
            match self.gate_task(task) {
                Ok(()) => approved.push((i, task.clone())),
                Err(e) => {
                    warn!("Policy rejected task '{}': {}", task.task_type, e);
                    slots[i] = Some(TaskResult::failure(e.to_string(), 0));
                }
            }
        }

        let to_run: Vec<TaskDescriptor> = approved.iter().map(|(_, t)| t.clone()).collect();
        let run_results = self.executor.execute_all(&to_run).await;
        for ((i, _), result) in approved.into_iter().zip(run_results) {
            slots[i] = Some(result);
        }

        slots
            .into_iter()
            .map(|slot| slot.unwrap_or_else(|| TaskResult::failure("task result missing", 0)))
            .collect()
    }

    /// Permission, limit, and safety-rule gate for one task
    fn gate_task(&self, task: &TaskDescriptor) -> std::result::Result<(), AgentError> {
        if !self
            .policy
            .check_permission(&self.identity.name, &task.task_type)
        {
            return Err(AgentError::PolicyViolation {
                task_type: task.task_type.clone(),
                reason: format!(
                    "'{}' lacks permission '{}'",
                    self.identity.name, task.task_type
                ),
            });
        }

        // Numeric parameters are checked against the limit of the same name
        for (param, value) in &task.params {
            if let Some(number) = value.as_f64() {
                if !self.policy.check_operational_limit(param, number) {
                    return Err(AgentError::PolicyViolation {
                        task_type: task.task_type.clone(),
                        reason: format!(
                            "parameter '{}' = {} exceeds its operational limit",
                            param, number
                        ),
                    });
                }
            }
        }

        let mut context = task.params.clone();
        context.insert(
            "type".to_string(),
            Value::String(task.task_type.clone()),
        );
        if !self.policy.check_all_safety_rules(&context) {
            return Err(AgentError::PolicyViolation {
                task_type: task.task_type.clone(),
                reason: "a safety rule rejected the task".to_string(),
            });
        }

        Ok(())
    }

    /// Record an unrecoverable trigger-dispatch fault and move to `Error`
    fn fault(&self, message: String) {
        let changed = self
            .lifecycle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .apply_fault();
        self.faults.fetch_add(1, Ordering::SeqCst);
        error!("Agent '{}' fault: {}", self.identity.name, message);
        if changed {
            warn!(
                "Agent '{}' moved to error state and must be stopped and replaced",
                self.identity.name
            );
        }
        self.report_error(&AgentError::TriggerFault(message));
    }

    fn report_error(&self, error: &AgentError) {
        let callback = self
            .error_cb
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(callback) = callback {
            callback(error);
        }
    }
}
