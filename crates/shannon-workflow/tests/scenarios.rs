//! End-to-end workflow scenarios (spec §8 "concrete end-to-end scenarios").
//!
//! Each test wires `WorkflowEngine` with small in-memory port
//! implementations and drives one full `run()` call, asserting on the
//! emitted event sequence and the final outcome rather than on internals.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use shannon_core::error::ShannonResult;
use shannon_core::model::{
    AgentResult, AgentResultStatus, AgentTask, ComplexityMode, ComplexityScore, EventKind,
    ExecutionMetrics, ModelTier, SessionContext, TaskRequest, TaskSummary,
};
use shannon_harness::circuit_breaker::{CircuitBreakerConfig, CircuitBreakerRegistry};
use shannon_harness::ports::{
    AgentExecutor, EventSink, Planner, PolicyDecision, PolicyEvaluatorPort, RateGate,
    SessionStorePort, VectorStorePort,
};
use shannon_workflow::engine::{WorkflowEngine, WorkflowEngineConfig};
use shannon_workflow::state_machine::WorkflowPhase;
use shannon_workflow::supervisor::WorkflowSupervisor;

// ---------------------------------------------------------------------------
// Shared fixtures
// ---------------------------------------------------------------------------

struct RecordingEventSink(Mutex<Vec<EventKind>>);

impl RecordingEventSink {
    fn new() -> Self {
        Self(Mutex::new(Vec::new()))
    }

    fn kinds(&self) -> Vec<EventKind> {
        self.0.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventSink for RecordingEventSink {
    async fn publish(&self, _workflow_id: Uuid, event: shannon_core::model::Event) -> ShannonResult<()> {
        self.0.lock().unwrap().push(event.kind);
        Ok(())
    }
}

struct InMemorySessions(Mutex<HashMap<Uuid, SessionContext>>);

impl InMemorySessions {
    fn new() -> Self {
        Self(Mutex::new(HashMap::new()))
    }
}

#[async_trait]
impl SessionStorePort for InMemorySessions {
    async fn get(&self, session_id: Uuid) -> ShannonResult<Option<SessionContext>> {
        Ok(self.0.lock().unwrap().get(&session_id).cloned())
    }
    async fn get_or_create(&self, session_id: Uuid, user_id: String) -> ShannonResult<SessionContext> {
        let mut guard = self.0.lock().unwrap();
        Ok(guard
            .entry(session_id)
            .or_insert_with(|| SessionContext::new(session_id, user_id))
            .clone())
    }
    async fn append_task(&self, session_id: Uuid, task: TaskSummary) -> ShannonResult<()> {
        if let Some(ctx) = self.0.lock().unwrap().get_mut(&session_id) {
            ctx.recent_tasks.push(task);
        }
        Ok(())
    }
    async fn update_context(
        &self,
        _session_id: Uuid,
        _patch: HashMap<String, serde_json::Value>,
    ) -> ShannonResult<()> {
        Ok(())
    }
    async fn delete(&self, session_id: Uuid) -> ShannonResult<()> {
        self.0.lock().unwrap().remove(&session_id);
        Ok(())
    }
}

struct NullMemory;
#[async_trait]
impl VectorStorePort for NullMemory {
    async fn find_similar(
        &self,
        _embedding: Vec<f32>,
        _limit: usize,
        _threshold: f32,
        _tenant_id: Option<String>,
    ) -> ShannonResult<Vec<serde_json::Value>> {
        Ok(Vec::new())
    }
    async fn session_context(
        &self,
        _session_id: Uuid,
        _tenant_id: Option<String>,
        _top_k: usize,
    ) -> ShannonResult<Vec<serde_json::Value>> {
        Ok(Vec::new())
    }
    async fn upsert(&self, _point: serde_json::Value) -> ShannonResult<()> {
        Ok(())
    }
    async fn delete(&self, _id: Uuid) -> ShannonResult<()> {
        Ok(())
    }
}

/// Echoes back a successful result per task, counting how many times each
/// task id was dispatched (so S4 can assert exactly-once dispatch). Each
/// call sleeps for `delay` so pause/cancel scenarios have a real window to
/// land a signal between two sequential dispatches.
struct CountingExecutor {
    counts: Mutex<HashMap<String, u32>>,
    delay: Duration,
}
impl CountingExecutor {
    fn new() -> Self {
        Self {
            counts: Mutex::new(HashMap::new()),
            delay: Duration::ZERO,
        }
    }
    fn with_delay(delay: Duration) -> Self {
        Self {
            counts: Mutex::new(HashMap::new()),
            delay,
        }
    }
    fn counts(&self) -> HashMap<String, u32> {
        self.counts.lock().unwrap().clone()
    }
}
#[async_trait]
impl AgentExecutor for CountingExecutor {
    async fn execute(&self, task: AgentTask) -> ShannonResult<AgentResult> {
        if self.delay > Duration::ZERO {
            tokio::time::sleep(self.delay).await;
        }
        *self.counts.lock().unwrap().entry(task.id.clone()).or_insert(0) += 1;
        Ok(AgentResult {
            agent_id: Uuid::new_v4(),
            task_id: task.id,
            output: Some("ok".to_string()),
            status: AgentResultStatus::Completed,
            error: None,
            metrics: ExecutionMetrics::default(),
        })
    }
}

struct FixedPlanner(ComplexityScore);
#[async_trait]
impl Planner for FixedPlanner {
    async fn plan(&self, _query: &str, _session: &SessionContext) -> ShannonResult<ComplexityScore> {
        Ok(self.0.clone())
    }
}

struct AllowPolicy;
#[async_trait]
impl PolicyEvaluatorPort for AllowPolicy {
    async fn evaluate(&self, _input: serde_json::Value) -> ShannonResult<PolicyDecision> {
        Ok(PolicyDecision {
            allow: true,
            reason: "ok".to_string(),
            obligations: None,
            require_approval: false,
            confidence: None,
        })
    }
}

struct NoDelay;
#[async_trait]
impl RateGate for NoDelay {
    async fn delay_for_request(&self, _provider: &str, _tier: &str, _estimated_tokens: u64) -> Duration {
        Duration::ZERO
    }
}

fn task_request() -> TaskRequest {
    TaskRequest {
        task_id: Uuid::new_v4(),
        user_id: "user-1".to_string(),
        tenant_id: "0".to_string(),
        session_id: Uuid::new_v4(),
        query: "diamond plan".to_string(),
        context: HashMap::new(),
        max_agents: 4,
        token_budget: 10_000,
    }
}

fn agent_task(id: &str, deps: &[&str]) -> AgentTask {
    AgentTask {
        id: id.to_string(),
        description: format!("task {id}"),
        dependencies: deps.iter().map(|d| d.to_string()).collect(),
        mode: "standard".to_string(),
        model_tier: ModelTier::Small,
    }
}

fn standard_score(tasks: Vec<AgentTask>) -> ComplexityScore {
    let n = tasks.len() as u32;
    ComplexityScore {
        mode: ComplexityMode::Standard,
        score: 0.5,
        estimated_agents: n,
        estimated_tokens: 100,
        estimated_cost_usd: 0.01,
        recommended_tier: ModelTier::Small,
        agent_tasks: tasks,
        reasoning: "diamond".to_string(),
    }
}

#[allow(clippy::too_many_arguments)]
fn build_engine(
    events: Arc<RecordingEventSink>,
    executor: Arc<CountingExecutor>,
    planner: Arc<FixedPlanner>,
    supervisor: Arc<WorkflowSupervisor>,
) -> WorkflowEngine {
    WorkflowEngine::new(
        events,
        Arc::new(InMemorySessions::new()),
        Arc::new(NullMemory),
        executor,
        planner,
        Arc::new(AllowPolicy),
        Arc::new(NoDelay),
        Arc::new(CircuitBreakerRegistry::new(CircuitBreakerConfig::default())),
        supervisor,
        WorkflowEngineConfig::default(),
    )
}

// ---------------------------------------------------------------------------
// S4 — DAG with diamond: A:{}, B:{A}, C:{A}, D:{B,C}
// ---------------------------------------------------------------------------

#[tokio::test]
async fn s4_diamond_dag_completes_with_one_dispatch_per_task() {
    let tasks = vec![
        agent_task("A", &[]),
        agent_task("B", &["A"]),
        agent_task("C", &["A"]),
        agent_task("D", &["B", "C"]),
    ];
    let events = Arc::new(RecordingEventSink::new());
    let executor = Arc::new(CountingExecutor::new());
    let planner = Arc::new(FixedPlanner(standard_score(tasks)));
    let engine = build_engine(events.clone(), executor.clone(), planner, Arc::new(WorkflowSupervisor::new()));

    let outcome = engine.run(Uuid::new_v4(), task_request(), None).await.unwrap();

    assert_eq!(outcome.phase, WorkflowPhase::Completed);
    assert_eq!(outcome.results.len(), 4);

    let counts = executor.counts();
    for id in ["A", "B", "C", "D"] {
        assert_eq!(counts.get(id), Some(&1), "task {id} should dispatch exactly once");
    }

    let kinds = events.kinds();
    assert_eq!(kinds.iter().filter(|k| **k == EventKind::WorkflowStarted).count(), 1);
    assert_eq!(kinds.iter().filter(|k| **k == EventKind::WorkflowCompleted).count(), 1);
    assert_eq!(kinds.iter().filter(|k| **k == EventKind::AgentCompleted).count(), 4);
}

// ---------------------------------------------------------------------------
// S5 — DAG with cycle: A:{C}, B:{A}, C:{B}
// ---------------------------------------------------------------------------

#[tokio::test]
async fn s5_cyclic_plan_falls_back_to_single_task_and_recovers() {
    let tasks = vec![
        agent_task("A", &["C"]),
        agent_task("B", &["A"]),
        agent_task("C", &["B"]),
    ];
    let events = Arc::new(RecordingEventSink::new());
    let executor = Arc::new(CountingExecutor::new());
    let planner = Arc::new(FixedPlanner(standard_score(tasks)));
    let engine = build_engine(events.clone(), executor.clone(), planner, Arc::new(WorkflowSupervisor::new()));

    let outcome = engine.run(Uuid::new_v4(), task_request(), None).await.unwrap();

    // Documented policy (DESIGN.md): a cyclic planner output degrades to a
    // single-task plan rather than failing the workflow outright.
    assert_eq!(outcome.phase, WorkflowPhase::Completed);
    assert_eq!(outcome.results.len(), 1);
    assert!(events.kinds().contains(&EventKind::ErrorRecovery));
}

// ---------------------------------------------------------------------------
// S6 — Pause after first AGENT_COMPLETED of a 3-task chain, then resume.
// ---------------------------------------------------------------------------

#[tokio::test]
async fn s6_pause_blocks_further_dispatch_until_resumed() {
    let tasks = vec![
        agent_task("A", &[]),
        agent_task("B", &["A"]),
        agent_task("C", &["B"]),
    ];
    let events = Arc::new(RecordingEventSink::new());
    let executor = Arc::new(CountingExecutor::with_delay(Duration::from_millis(30)));
    let planner = Arc::new(FixedPlanner(standard_score(tasks)));
    let supervisor = Arc::new(WorkflowSupervisor::new());
    let engine = Arc::new(build_engine(events.clone(), executor.clone(), planner, supervisor.clone()));

    let workflow_id = Uuid::new_v4();
    let request = task_request();

    let run_handle = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.run(workflow_id, request, None).await })
    };

    // The chain is strictly sequential (A -> B -> C) and each dispatch takes
    // 30ms. Pausing at 10ms lands while A is still in flight, well before
    // the checkpoint after A completes re-checks control state.
    tokio::time::sleep(Duration::from_millis(10)).await;
    supervisor
        .pause(workflow_id, "operator request".into(), "alice".into())
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(!run_handle.is_finished(), "workflow should be blocked while paused");

    supervisor.resume(workflow_id, "alice".into()).await.unwrap();

    let outcome = run_handle.await.unwrap().unwrap();
    assert_eq!(outcome.phase, WorkflowPhase::Completed);
    assert_eq!(outcome.results.len(), 3);
    assert!(events.kinds().contains(&EventKind::WorkflowPaused));
    assert!(events.kinds().contains(&EventKind::WorkflowResumed));
}

// ---------------------------------------------------------------------------
// S9 — cancellation terminality: no AGENT_STARTED is emitted after cancel.
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancel_before_dispatch_yields_cancelled_with_no_agent_started() {
    let tasks = vec![agent_task("A", &[])];
    let events = Arc::new(RecordingEventSink::new());
    let executor = Arc::new(CountingExecutor::new());
    let planner = Arc::new(FixedPlanner(standard_score(tasks)));
    let supervisor = Arc::new(WorkflowSupervisor::new());
    let workflow_id = Uuid::new_v4();
    supervisor.register(workflow_id, None).await.unwrap();
    supervisor
        .cancel(workflow_id, "user cancelled".into(), "bob".into())
        .await
        .unwrap();
    supervisor.unregister(workflow_id);

    let engine = build_engine(events.clone(), executor.clone(), planner, supervisor.clone());
    // Re-register then cancel immediately so `run`'s first checkpoint sees it.
    supervisor.register(workflow_id, None).await.unwrap();
    supervisor
        .cancel(workflow_id, "user cancelled".into(), "bob".into())
        .await
        .unwrap();

    let outcome = engine.run(workflow_id, task_request(), None).await.unwrap();
    assert_eq!(outcome.phase, WorkflowPhase::Cancelled);
    assert_eq!(executor.counts().len(), 0, "no agent should ever have started");
    assert!(!events.kinds().contains(&EventKind::AgentStarted));
}
