//! HTTP handlers for the submit-task and session external interfaces
//! (spec §6). Each handler does just enough translation between wire DTOs
//! and the C1-C8 ports to keep business logic out of this layer — routing,
//! planning, dispatch, and policy all live in `shannon_workflow::engine`.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use uuid::Uuid;

use shannon_api_types::{
    AddMessageRequest, CancelTaskRequest, CreateSessionRequest, GetTaskStatusResponse,
    ListSessionsQuery, ListSessionsResponse, PauseTaskRequest, ResumeTaskRequest, SessionContext,
    SignalAck, SubmitTaskRequest, SubmitTaskResponse,
};
use shannon_core::model::TaskRequest;
use shannon_core::store::{TaskRecord, TaskStatus};
use shannon_harness::ports::SessionStorePort;

use crate::errors::DaemonError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Submit-task API
// ---------------------------------------------------------------------------

pub async fn submit_task(
    State(state): State<AppState>,
    Json(req): Json<SubmitTaskRequest>,
) -> Result<Json<SubmitTaskResponse>, DaemonError> {
    let session_id = req.session_id.unwrap_or_else(Uuid::new_v4);
    state
        .sessions
        .get_or_create(session_id, req.user_id.clone())
        .await?;

    let task_id = Uuid::new_v4();
    let workflow_id = Uuid::new_v4();
    state.workflow_of_task.insert(task_id, workflow_id);

    let request = TaskRequest {
        task_id,
        user_id: req.user_id,
        tenant_id: req.tenant_id.unwrap_or_else(|| "0".to_string()),
        session_id,
        query: req.query,
        context: req.context,
        max_agents: req.max_agents,
        token_budget: req.token_budget,
    };

    state
        .tasks
        .upsert(TaskRecord {
            task_id,
            user_id: request.user_id.clone(),
            session_id,
            query: request.query.clone(),
            status: TaskStatus::Routing,
            mode: None,
            model_used: None,
            provider: None,
            tokens: 0,
            cost_usd: 0.0,
            started_at: Utc::now(),
            completed_at: None,
            error: None,
        })
        .await?;

    let engine = state.engine.clone();
    let tasks = state.tasks.clone();
    let request_for_record = request.clone();
    tokio::spawn(async move {
        let outcome = engine.run(workflow_id, request, None).await;
        let mut record = TaskRecord {
            task_id: request_for_record.task_id,
            user_id: request_for_record.user_id,
            session_id: request_for_record.session_id,
            query: request_for_record.query,
            status: TaskStatus::Failed,
            mode: None,
            model_used: None,
            provider: None,
            tokens: 0,
            cost_usd: 0.0,
            started_at: Utc::now(),
            completed_at: Some(Utc::now()),
            error: None,
        };
        match outcome {
            Ok(o) => {
                record.status = if o.error.is_some() {
                    TaskStatus::Failed
                } else {
                    TaskStatus::Completed
                };
                record.tokens = o.token_usage.total_tokens;
                record.cost_usd = o.token_usage.cost_usd;
                record.error = o.error;
            }
            Err(e) => record.error = Some(e.to_string()),
        }
        if let Err(e) = tasks.upsert(record).await {
            tracing::warn!(%task_id, error = %e, "failed to persist final task record");
        }
    });

    Ok(Json(SubmitTaskResponse {
        task_id,
        workflow_id,
        session_id,
    }))
}

pub async fn get_task_status(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> Result<Json<GetTaskStatusResponse>, DaemonError> {
    let record = state
        .tasks
        .get(task_id)
        .await?
        .ok_or_else(|| DaemonError::NotFound(format!("task {task_id}")))?;

    Ok(Json(GetTaskStatusResponse {
        task_id: record.task_id,
        status: status_label(record.status),
        query: record.query,
        mode: record.mode,
        // The rendered answer is delivered through the event stream (an
        // `EventKind::WorkflowCompleted` payload), not persisted here —
        // `TaskRecord` only tracks accounting, not output text.
        result: None,
        error: record.error,
        tokens: record.tokens,
        cost_usd: record.cost_usd,
        created_at: record.started_at,
        completed_at: record.completed_at,
    }))
}

fn status_label(status: TaskStatus) -> String {
    serde_json::to_value(status)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn cancel_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    Json(req): Json<CancelTaskRequest>,
) -> Result<Json<SignalAck>, DaemonError> {
    let workflow_id = state
        .workflow_id_for(task_id)
        .ok_or_else(|| DaemonError::NotFound(format!("task {task_id}")))?;
    state
        .supervisor
        .cancel(workflow_id, req.reason, req.requested_by)
        .await
        .map_err(|e| DaemonError::NotFound(e.to_string()))?;
    Ok(Json(SignalAck { accepted: true }))
}

pub async fn pause_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    Json(req): Json<PauseTaskRequest>,
) -> Result<Json<SignalAck>, DaemonError> {
    let workflow_id = state
        .workflow_id_for(task_id)
        .ok_or_else(|| DaemonError::NotFound(format!("task {task_id}")))?;
    state
        .supervisor
        .pause(workflow_id, req.reason, req.requested_by)
        .await
        .map_err(|e| DaemonError::NotFound(e.to_string()))?;
    Ok(Json(SignalAck { accepted: true }))
}

pub async fn resume_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    Json(req): Json<ResumeTaskRequest>,
) -> Result<Json<SignalAck>, DaemonError> {
    let workflow_id = state
        .workflow_id_for(task_id)
        .ok_or_else(|| DaemonError::NotFound(format!("task {task_id}")))?;
    state
        .supervisor
        .resume(workflow_id, req.requested_by)
        .await
        .map_err(|e| DaemonError::NotFound(e.to_string()))?;
    Ok(Json(SignalAck { accepted: true }))
}

// ---------------------------------------------------------------------------
// Session API
// ---------------------------------------------------------------------------

pub async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<Json<SessionContext>, DaemonError> {
    let session_id = req.session_id.unwrap_or_else(Uuid::new_v4);
    let ctx = state.sessions.get_or_create(session_id, req.user_id).await?;
    Ok(Json(ctx))
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionContext>, DaemonError> {
    let ctx = state
        .sessions
        .get(session_id)
        .await?
        .ok_or_else(|| DaemonError::NotFound(format!("session {session_id}")))?;
    Ok(Json(ctx))
}

pub async fn list_sessions(
    State(state): State<AppState>,
    Query(q): Query<ListSessionsQuery>,
) -> Result<Json<ListSessionsResponse>, DaemonError> {
    let (sessions, total_count) = state.sessions.list_sessions(q.user_id, q.limit, q.offset).await?;
    Ok(Json(ListSessionsResponse { sessions, total_count }))
}

pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SignalAck>, DaemonError> {
    state.sessions.delete(session_id).await?;
    Ok(Json(SignalAck { accepted: true }))
}

pub async fn add_message(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<AddMessageRequest>,
) -> Result<Json<SignalAck>, DaemonError> {
    let ctx = state
        .sessions
        .get(session_id)
        .await?
        .ok_or_else(|| DaemonError::NotFound(format!("session {session_id}")))?;

    let mut messages = ctx
        .context
        .get("messages")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    messages.push(serde_json::json!({
        "role": req.role,
        "content": req.content,
        "at": Utc::now(),
    }));

    let mut patch = HashMap::new();
    patch.insert("messages".to_string(), serde_json::Value::Array(messages));
    state.sessions.update_context(session_id, patch).await?;
    Ok(Json(SignalAck { accepted: true }))
}
