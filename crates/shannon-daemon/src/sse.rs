//! SSE streaming for the Subscribe external interface (spec §6, §4.3).
//!
//! Frames the per-workflow event log as `text/event-stream`, using the
//! `Last-Event-ID` header (or an explicit query param, for clients that
//! can't set custom headers on the initial request) to resume replay from
//! where a reconnecting client left off.

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::StreamExt;
use serde::Deserialize;
use uuid::Uuid;

use shannon_eventstream::protocol::{parse_last_event_id, to_sse_frame};

use crate::errors::DaemonError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SubscribeQuery {
    #[serde(default)]
    pub last_event_id: Option<u64>,
}

pub async fn subscribe(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    Query(query): Query<SubscribeQuery>,
    headers: HeaderMap,
) -> Result<Response, DaemonError> {
    let workflow_id = state
        .workflow_id_for(task_id)
        .ok_or_else(|| DaemonError::NotFound(format!("task {task_id}")))?;

    let last_seen_seq = query.last_event_id.or_else(|| {
        parse_last_event_id(headers.get("last-event-id").and_then(|v| v.to_str().ok()))
    });

    let rx = state.events.subscribe(workflow_id, last_seen_seq).await;
    let stream = rx
        .into_stream()
        .map(|event| Ok::<_, std::convert::Infallible>(axum::body::Bytes::from(to_sse_frame(&event))));
    let body = Body::from_stream(stream);

    let mut response = (StatusCode::OK, body).into_response();
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    Ok(response)
}
