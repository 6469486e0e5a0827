//! Wire shapes for the external interfaces (spec §6).
//!
//! One struct per RPC request/response. No business logic lives here —
//! validation, defaults, and persistence are the daemon's job. Responses
//! that are already exactly the §3 data model (`SessionContext`, `Event`)
//! are re-exported rather than duplicated.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use shannon_core::model::{Event, SessionContext, TaskSummary};

// ---------------------------------------------------------------------------
// Submit-task API
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitTaskRequest {
    pub user_id: String,
    #[serde(default)]
    pub tenant_id: Option<String>,
    /// A caller may continue an existing session or, if omitted, start a
    /// fresh one (the daemon mints a new `session_id`).
    #[serde(default)]
    pub session_id: Option<Uuid>,
    pub query: String,
    #[serde(default)]
    pub context: HashMap<String, serde_json::Value>,
    #[serde(default = "default_max_agents")]
    pub max_agents: u32,
    #[serde(default = "default_token_budget")]
    pub token_budget: u64,
}

fn default_max_agents() -> u32 {
    4
}

fn default_token_budget() -> u64 {
    50_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitTaskResponse {
    pub task_id: Uuid,
    pub workflow_id: Uuid,
    pub session_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetTaskStatusResponse {
    pub task_id: Uuid,
    pub status: String,
    pub query: String,
    pub mode: Option<String>,
    pub result: Option<String>,
    pub error: Option<String>,
    pub tokens: u64,
    pub cost_usd: f64,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelTaskRequest {
    pub reason: String,
    pub requested_by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PauseTaskRequest {
    pub reason: String,
    pub requested_by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeTaskRequest {
    pub requested_by: String,
}

/// Acknowledges a signal (`CancelTask`/`PauseTask`/`ResumeTask`) was
/// recorded; the effect itself lands at the workflow's next checkpoint
/// (spec §4.8 "Checkpoints"), not synchronously with this response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalAck {
    pub accepted: bool,
}

// ---------------------------------------------------------------------------
// Session API
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    pub user_id: String,
    #[serde(default)]
    pub session_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListSessionsQuery {
    pub user_id: String,
    #[serde(default = "default_list_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_list_limit() -> u32 {
    20
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListSessionsResponse {
    pub sessions: Vec<SessionContext>,
    pub total_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddMessageRequest {
    pub role: String,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_task_request_fills_in_defaults() {
        let req: SubmitTaskRequest = serde_json::from_str(
            r#"{"user_id": "u1", "query": "hello"}"#,
        )
        .unwrap();
        assert_eq!(req.max_agents, 4);
        assert_eq!(req.token_budget, 50_000);
        assert!(req.session_id.is_none());
    }

    #[test]
    fn list_sessions_query_defaults_limit_to_twenty() {
        let q: ListSessionsQuery = serde_json::from_str(r#"{"user_id": "u1"}"#).unwrap();
        assert_eq!(q.limit, 20);
        assert_eq!(q.offset, 0);
    }
}
