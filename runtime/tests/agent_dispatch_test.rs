//! Integration tests for the trigger → plan → gate → execute pipeline
//!
//! Drives a fully wired agent with real triggers and asserts on handler
//! invocations, memory records, policy gating, pause suppression, and
//! fault propagation.

use async_trait::async_trait;
use drover_runtime::executor::{Executor, ExecutorConfig};
use drover_runtime::memory::MemoryStore;
use drover_runtime::planner::{PlanRule, Planner, RulePlanner};
use drover_runtime::policy::PolicyEngine;
use drover_runtime::trigger::{
    ChainEventConfig, ChainEventTrigger, IntervalConfig, IntervalTrigger,
};
use drover_runtime::{Agent, AgentIdentity};
use sdk::collaborators::{
    AgentRecord, ChainEvents, ContractExecutor, ContractRegistry, ExecutionEntry, ExecutionLog,
    ExecutionReceipt,
};
use sdk::errors::AgentError;
use sdk::types::{AgentState, ChainLog, RecordKind, TaskDescriptor};
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;

struct StubRegistry;

#[async_trait]
impl ContractRegistry for StubRegistry {
    async fn get_agent(&self, agent_id: &str) -> Result<AgentRecord, AgentError> {
        Ok(AgentRecord {
            id: agent_id.to_string(),
            name: "registered-agent".to_string(),
            owner: "0xowner".to_string(),
            metadata_uri: "ipfs://metadata".to_string(),
            active: true,
        })
    }
}

struct StubContractExecutor;

#[async_trait]
impl ContractExecutor for StubContractExecutor {
    async fn execute(&self, task_id: &str) -> Result<ExecutionReceipt, AgentError> {
        Ok(ExecutionReceipt {
            task_id: task_id.to_string(),
            tx_hash: "0xabc".to_string(),
            success: true,
        })
    }
}

/// Execution log that collects entries for assertions
struct CollectingLog {
    entries: Mutex<Vec<ExecutionEntry>>,
}

#[async_trait]
impl ExecutionLog for CollectingLog {
    async fn record(&self, entry: ExecutionEntry) -> Result<(), AgentError> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }
}

/// Chain-event source whose subscription is fed (or dropped) by the test
struct StubChain {
    tx: Mutex<Option<mpsc::Sender<ChainLog>>>,
}

#[async_trait]
impl ChainEvents for StubChain {
    async fn subscribe(
        &self,
        _contract: &str,
        _event: &str,
    ) -> Result<mpsc::Receiver<ChainLog>, AgentError> {
        let (tx, rx) = mpsc::channel(16);
        *self.tx.lock().unwrap() = Some(tx);
        Ok(rx)
    }
}

fn identity() -> AgentIdentity {
    AgentIdentity {
        agent_id: "agent-1".to_string(),
        name: "dispatch-tester".to_string(),
        description: "Trade on schedule".to_string(),
        capabilities: vec!["trading".to_string()],
    }
}

fn buy_planner() -> Arc<RulePlanner> {
    Arc::new(RulePlanner::new(vec![PlanRule::contains(
        "trade",
        vec![
            TaskDescriptor::new("check_balance"),
            TaskDescriptor::new("execute_trade").with_param("amount", json!(50)),
        ],
    )]))
}

fn counting_executor(calls: Arc<AtomicU64>) -> Arc<Executor> {
    let executor = Executor::new(ExecutorConfig {
        retry_delay: Duration::from_millis(5),
        timeout: Duration::from_millis(500),
        ..ExecutorConfig::default()
    });
    let balance_calls = Arc::clone(&calls);
    executor.register_fn("check_balance", move |_task, _ctx| {
        let calls = Arc::clone(&balance_calls);
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(json!({"balance": 1000}))
        }
    });
    let trade_calls = Arc::clone(&calls);
    executor.register_fn("execute_trade", move |task, _ctx| {
        let calls = Arc::clone(&trade_calls);
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(json!({"traded": task.params.get("amount").cloned()}))
        }
    });
    Arc::new(executor)
}

async fn wired_agent(
    planner: Arc<dyn Planner>,
    executor: Arc<Executor>,
    policy: Arc<PolicyEngine>,
    memory: MemoryStore,
) -> Agent {
    let mut agent = Agent::new(identity(), planner, executor, policy, memory);
    agent
        .initialize(Arc::new(StubRegistry), Arc::new(StubContractExecutor))
        .await
        .unwrap();
    agent
}

#[tokio::test]
async fn test_interval_trigger_drives_full_pipeline() {
    let calls = Arc::new(AtomicU64::new(0));
    let memory = MemoryStore::in_memory();
    let mut agent = wired_agent(
        buy_planner(),
        counting_executor(Arc::clone(&calls)),
        Arc::new(PolicyEngine::new()),
        memory.clone(),
    )
    .await;

    let log = Arc::new(CollectingLog {
        entries: Mutex::new(Vec::new()),
    });
    agent.set_execution_log(Arc::clone(&log) as Arc<dyn ExecutionLog>);

    agent
        .add_trigger(Box::new(IntervalTrigger::new(
            IntervalConfig::every(Duration::from_millis(10)).immediate().limit(1),
        )))
        .unwrap();

    agent.start().await.unwrap();
    sleep(Duration::from_millis(200)).await;
    agent.stop().await.unwrap();

    // Both planned tasks ran
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    // Memory holds the observed goal and the outcome summary
    let records = memory.get_recent(10).await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].kind, RecordKind::Input);
    assert!(records[0].content.contains("Trade on schedule"));
    assert_eq!(records[1].kind, RecordKind::Output);
    assert!(records[1].content.contains("2/2 tasks succeeded"));

    // The execution log saw one entry with both results in plan order
    let entries = log.entries.lock().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].results.len(), 2);
    assert!(entries[0].results.iter().all(|r| r.is_success()));
}

#[tokio::test]
async fn test_interval_limit_three_dispatches_exactly_three() {
    let memory = MemoryStore::in_memory();
    let mut agent = wired_agent(
        Arc::new(RulePlanner::new(vec![])),
        Arc::new(Executor::new(ExecutorConfig::default())),
        Arc::new(PolicyEngine::new()),
        memory,
    )
    .await;

    agent
        .add_trigger(Box::new(IntervalTrigger::new(
            IntervalConfig::every(Duration::from_millis(10)).immediate().limit(3),
        )))
        .unwrap();

    agent.start().await.unwrap();
    sleep(Duration::from_millis(300)).await;

    // The trigger self-stopped after three firings
    assert_eq!(agent.status().dispatches, 3);
    agent.stop().await.unwrap();
    assert_eq!(agent.status().dispatches, 3);
}

#[tokio::test]
async fn test_policy_rejected_task_never_reaches_handler() {
    let calls = Arc::new(AtomicU64::new(0));
    let policy = Arc::new(PolicyEngine::new());
    // amount 50 exceeds this limit; check_balance carries no numeric params
    policy.set_operational_limit("amount", 10.0);

    let memory = MemoryStore::in_memory();
    let mut agent = wired_agent(
        buy_planner(),
        counting_executor(Arc::clone(&calls)),
        policy,
        memory.clone(),
    )
    .await;

    agent
        .add_trigger(Box::new(IntervalTrigger::new(
            IntervalConfig::every(Duration::from_millis(10)).immediate().limit(1),
        )))
        .unwrap();

    agent.start().await.unwrap();
    sleep(Duration::from_millis(200)).await;
    agent.stop().await.unwrap();

    // Only check_balance ran; execute_trade was gated out before dispatch
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let records = memory.get_recent(10).await.unwrap();
    let output = records.last().unwrap();
    assert!(output.content.contains("1/2 tasks succeeded"));
    let results = output.metadata.get("results").unwrap();
    assert!(results[1]["error"]
        .as_str()
        .unwrap()
        .contains("operational limit"));
}

#[tokio::test]
async fn test_safety_rule_gates_by_task_type() {
    let calls = Arc::new(AtomicU64::new(0));
    let policy = Arc::new(PolicyEngine::new());
    policy.add_safety_rule("no_trades", |ctx| {
        ctx.get("type").and_then(serde_json::Value::as_str) != Some("execute_trade")
    });

    let memory = MemoryStore::in_memory();
    let mut agent = wired_agent(
        buy_planner(),
        counting_executor(Arc::clone(&calls)),
        policy,
        memory,
    )
    .await;

    agent
        .add_trigger(Box::new(IntervalTrigger::new(
            IntervalConfig::every(Duration::from_millis(10)).immediate().limit(1),
        )))
        .unwrap();

    agent.start().await.unwrap();
    sleep(Duration::from_millis(200)).await;
    agent.stop().await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_pause_suppresses_events_resume_restores() {
    let calls = Arc::new(AtomicU64::new(0));
    let mut agent = wired_agent(
        buy_planner(),
        counting_executor(Arc::clone(&calls)),
        Arc::new(PolicyEngine::new()),
        MemoryStore::in_memory(),
    )
    .await;

    agent
        .add_trigger(Box::new(IntervalTrigger::new(IntervalConfig::every(
            Duration::from_millis(20),
        ))))
        .unwrap();

    agent.start().await.unwrap();
    sleep(Duration::from_millis(100)).await;
    agent.pause().unwrap();
    let seen_at_pause = calls.load(Ordering::SeqCst);
    assert!(seen_at_pause > 0);

    // The trigger keeps ticking but nothing reaches the pipeline
    sleep(Duration::from_millis(150)).await;
    assert_eq!(calls.load(Ordering::SeqCst), seen_at_pause);

    agent.resume().unwrap();
    sleep(Duration::from_millis(100)).await;
    assert!(calls.load(Ordering::SeqCst) > seen_at_pause);

    agent.stop().await.unwrap();
}

#[tokio::test]
async fn test_plan_failure_reaches_error_callback_not_state() {
    /// Planner that always fails to parse
    struct BrokenPlanner;

    #[async_trait]
    impl Planner for BrokenPlanner {
        fn name(&self) -> &str {
            "broken"
        }

        async fn plan(
            &self,
            _goal: &str,
            _context: &str,
        ) -> Result<Vec<TaskDescriptor>, AgentError> {
            Err(AgentError::PlanParse("no JSON array".to_string()))
        }
    }

    let mut agent = wired_agent(
        Arc::new(BrokenPlanner),
        Arc::new(Executor::new(ExecutorConfig::default())),
        Arc::new(PolicyEngine::new()),
        MemoryStore::in_memory(),
    )
    .await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_cb = Arc::clone(&seen);
    agent.on_error(Arc::new(move |e: &AgentError| {
        seen_cb.lock().unwrap().push(e.to_string());
    }));

    agent
        .add_trigger(Box::new(IntervalTrigger::new(
            IntervalConfig::every(Duration::from_millis(10)).immediate().limit(1),
        )))
        .unwrap();

    agent.start().await.unwrap();
    sleep(Duration::from_millis(200)).await;

    // A plan failure is per-dispatch: the agent keeps running
    assert_eq!(agent.state(), AgentState::Running);
    let errors = seen.lock().unwrap().clone();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("plan output could not be parsed"));

    agent.stop().await.unwrap();
}

#[tokio::test]
async fn test_chain_events_flow_and_dropped_subscription_faults() {
    let calls = Arc::new(AtomicU64::new(0));
    let chain = Arc::new(StubChain {
        tx: Mutex::new(None),
    });

    let planner = Arc::new(RulePlanner::new(vec![PlanRule::contains(
        "TaskCreated",
        vec![TaskDescriptor::new("check_balance")],
    )]));

    let mut agent = wired_agent(
        planner,
        counting_executor(Arc::clone(&calls)),
        Arc::new(PolicyEngine::new()),
        MemoryStore::in_memory(),
    )
    .await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_cb = Arc::clone(&seen);
    agent.on_error(Arc::new(move |e: &AgentError| {
        seen_cb.lock().unwrap().push(e.to_string());
    }));

    agent
        .add_trigger(Box::new(ChainEventTrigger::new(
            Arc::clone(&chain) as Arc<dyn ChainEvents>,
            ChainEventConfig::new("0xfeed", "TaskCreated"),
        )))
        .unwrap();

    agent.start().await.unwrap();

    let tx = chain.tx.lock().unwrap().clone().unwrap();
    tx.send(ChainLog {
        contract: "0xfeed".to_string(),
        event: "TaskCreated".to_string(),
        args: serde_json::Map::new(),
        block_number: 7,
        log_index: 0,
        tx_hash: "0x07".to_string(),
    })
    .await
    .unwrap();
    sleep(Duration::from_millis(100)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(agent.state(), AgentState::Running);

    // Dropping the subscription sender kills the stream: agent faults
    drop(tx);
    chain.tx.lock().unwrap().take();
    sleep(Duration::from_millis(100)).await;

    assert_eq!(agent.state(), AgentState::Error);
    assert_eq!(agent.status().faults, 1);
    assert!(seen
        .lock()
        .unwrap()
        .iter()
        .any(|e| e.contains("trigger fault")));

    // An agent in error must still be stoppable
    agent.stop().await.unwrap();
    assert_eq!(agent.state(), AgentState::Stopped);
}
