//! Named port traits (spec §9 redesign note: "dynamic dispatch over
//! dependencies" becomes a small set of explicit async traits instead of an
//! ad-hoc trait-object soup). Every external dependency the workflow engine
//! talks to — event sink, session store, vector store, agent executor,
//! planner, policy evaluator, rate gate, circuit breaker — is named here as
//! a trait; `shannon-workflow` depends only on these, never on a concrete
//! crate, so swapping an in-process adapter for a real backend never
//! touches the engine.
//!
//! Shaped after an `LlmProvider`-style trait (one `async_trait` method
//! per capability, `Result<T, Self::Error>` associated error types where the
//! error needs to carry dependency-specific detail).

use async_trait::async_trait;
use uuid::Uuid;

use shannon_core::error::ShannonResult;
use shannon_core::model::{
    AgentResult, AgentTask, ComplexityScore, ControlState, Event, SessionContext, TaskSummary,
};

/// Durable per-workflow event log (C3).
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, workflow_id: Uuid, event: Event) -> ShannonResult<()>;
}

/// Session persistence (C5).
#[async_trait]
pub trait SessionStorePort: Send + Sync {
    async fn get(&self, session_id: Uuid) -> ShannonResult<Option<SessionContext>>;

    /// Fetch the session, creating an empty one for `user_id` if it does
    /// not exist yet. Used by ROUTING, which always needs a context to
    /// bias classification against, and by the `CreateSession` external
    /// API (spec §6).
    async fn get_or_create(&self, session_id: Uuid, user_id: String) -> ShannonResult<SessionContext>;

    async fn append_task(&self, session_id: Uuid, task: TaskSummary) -> ShannonResult<()>;
    async fn update_context(
        &self,
        session_id: Uuid,
        patch: std::collections::HashMap<String, serde_json::Value>,
    ) -> ShannonResult<()>;
    async fn delete(&self, session_id: Uuid) -> ShannonResult<()>;
}

/// Similarity search / embedding memory (C6).
#[async_trait]
pub trait VectorStorePort: Send + Sync {
    async fn find_similar(
        &self,
        embedding: Vec<f32>,
        limit: usize,
        threshold: f32,
        tenant_id: Option<String>,
    ) -> ShannonResult<Vec<serde_json::Value>>;

    /// Filter-only retrieval scoped to a session, no embedding argument.
    async fn session_context(
        &self,
        session_id: Uuid,
        tenant_id: Option<String>,
        top_k: usize,
    ) -> ShannonResult<Vec<serde_json::Value>>;

    /// Insert or replace a point. Implementations must validate the vector's
    /// dimensionality against the collection's configured dimension and
    /// return a `ShannonError::Validation` carrying the structured mismatch
    /// detail when it disagrees (spec §4.6).
    async fn upsert(&self, point: serde_json::Value) -> ShannonResult<()>;

    async fn delete(&self, id: Uuid) -> ShannonResult<()>;
}

/// Remote agent execution — the downstream capability DISPATCHING invokes
/// through a circuit breaker.
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    async fn execute(&self, task: AgentTask) -> ShannonResult<AgentResult>;
}

/// External planner call PLANNING treats as a remote capability.
#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(&self, query: &str, session: &SessionContext) -> ShannonResult<ComplexityScore>;
}

/// Policy decisioning (C2), as seen by the workflow engine.
#[async_trait]
pub trait PolicyEvaluatorPort: Send + Sync {
    async fn evaluate(&self, input: serde_json::Value) -> ShannonResult<PolicyDecision>;
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PolicyDecision {
    pub allow: bool,
    pub reason: String,
    pub obligations: Option<PolicyObligations>,
    pub require_approval: bool,
    pub confidence: Option<f64>,
}

/// Restrictions attached to an allow decision (spec §4.2 "Obligations").
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct PolicyObligations {
    pub max_tokens: Option<u64>,
    pub allowed_models: Option<Vec<String>>,
    pub tool_restrictions: Option<Vec<String>>,
}

/// Rate/delay calculation (C1), as seen by the workflow engine.
#[async_trait]
pub trait RateGate: Send + Sync {
    async fn delay_for_request(
        &self,
        provider: &str,
        tier: &str,
        estimated_tokens: u64,
    ) -> std::time::Duration;
}

/// Cancellation/pause/resume, queried for control-state checkpoints.
pub trait ControlStateQuery: Send + Sync {
    fn control_state(&self) -> ControlState;
}
