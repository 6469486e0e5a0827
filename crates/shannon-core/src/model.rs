//! The data model shared by every component (spec §3).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

fn zero_tenant() -> String {
    "0".to_string()
}

/// Submitted once per request; immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequest {
    pub task_id: Uuid,
    pub user_id: String,
    #[serde(default = "zero_tenant")]
    pub tenant_id: String,
    pub session_id: Uuid,
    pub query: String,
    #[serde(default)]
    pub context: HashMap<String, serde_json::Value>,
    pub max_agents: u32,
    pub token_budget: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityMode {
    Simple,
    Standard,
    Complex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    Small,
    Medium,
    Large,
}

/// Produced once per TaskRequest; drives routing and budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplexityScore {
    pub mode: ComplexityMode,
    pub score: f64,
    pub estimated_agents: u32,
    pub estimated_tokens: u64,
    pub estimated_cost_usd: f64,
    pub recommended_tier: ModelTier,
    pub agent_tasks: Vec<AgentTask>,
    pub reasoning: String,
}

/// A node of the execution DAG.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTask {
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    pub mode: String,
    pub model_tier: ModelTier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentResultStatus {
    Completed,
    Failed,
}

/// Monotonic within a task attempt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub cost_usd: f64,
    pub model: String,
    pub tier: String,
}

impl TokenUsage {
    /// Additive merge, used by C5 session aggregation (property 8) and by
    /// AGGREGATING's running-total merge.
    pub fn merge(&mut self, other: &TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
        self.cost_usd += other.cost_usd;
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionMetrics {
    pub latency_ms: u64,
    pub token_usage: TokenUsage,
    pub cache_hit: bool,
    pub cache_score: Option<f64>,
    pub agents_used: u32,
    pub mode: String,
}

/// Produced exactly once per AgentTask per attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResult {
    pub agent_id: Uuid,
    pub task_id: String,
    pub output: Option<String>,
    pub status: AgentResultStatus,
    pub error: Option<String>,
    pub metrics: ExecutionMetrics,
}

/// A bounded, sliding-window summary kept in SessionContext.recent_tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSummary {
    pub task_id: Uuid,
    pub query: String,
    pub status: String,
    pub tokens_used: u64,
    pub cost_usd: f64,
    pub completed_at: DateTime<Utc>,
}

/// One per active session; mutated by C8 and C5.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionContext {
    pub session_id: Uuid,
    pub user_id: String,
    #[serde(default)]
    pub context: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub recent_tasks: Vec<TaskSummary>,
    #[serde(default)]
    pub token_usage: TokenUsage,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionContext {
    pub fn new(session_id: Uuid, user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            user_id: user_id.into(),
            context: HashMap::new(),
            recent_tasks: Vec::new(),
            token_usage: TokenUsage::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// A single entry in a workflow's ordered, append-only event log (C3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub workflow_id: Uuid,
    pub seq: u64,
    pub stream_id: Uuid,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub agent_id: Option<Uuid>,
    pub message: String,
    #[serde(default)]
    pub payload: HashMap<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

/// Event types the workflow engine produces (spec §4.3, non-exhaustive list
/// taken verbatim).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    WorkflowStarted,
    WorkflowCompleted,
    WorkflowPausing,
    WorkflowPaused,
    WorkflowResumed,
    WorkflowCancelling,
    WorkflowCancelled,
    AgentStarted,
    AgentThinking,
    AgentCompleted,
    ToolInvoked,
    ToolObservation,
    LlmPartial,
    LlmOutput,
    DataProcessing,
    Progress,
    ErrorOccurred,
    ErrorRecovery,
    ApprovalRequested,
    TeamRecruited,
    TeamRetired,
    TeamStatus,
    /// Synthetic marker emitted by `subscribe` when retention no longer
    /// covers the requested `last_seen_seq` (spec §4.3).
    Gap,
}

/// One per live workflow; queried by operators.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControlState {
    pub is_paused: bool,
    pub is_cancelled: bool,
    pub paused_at: Option<DateTime<Utc>>,
    pub pause_reason: Option<String>,
    pub paused_by: Option<String>,
    pub cancel_reason: Option<String>,
    pub cancelled_by: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_usage_merge_is_additive() {
        let mut total = TokenUsage::default();
        total.merge(&TokenUsage {
            total_tokens: 10,
            cost_usd: 0.5,
            ..Default::default()
        });
        total.merge(&TokenUsage {
            total_tokens: 5,
            cost_usd: 0.25,
            ..Default::default()
        });
        assert_eq!(total.total_tokens, 15);
        assert!((total.cost_usd - 0.75).abs() < 1e-9);
    }

    #[test]
    fn session_context_starts_empty() {
        let ctx = SessionContext::new(Uuid::new_v4(), "user-1");
        assert!(ctx.recent_tasks.is_empty());
        assert_eq!(ctx.token_usage.total_tokens, 0);
        assert_eq!(ctx.created_at, ctx.updated_at);
    }
}
