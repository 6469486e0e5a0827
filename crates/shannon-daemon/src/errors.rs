//! HTTP error mapping for the external interfaces (spec §6).
//!
//! Wraps `ShannonError` the same way a thin API-error wrapper usually
//! handles its own handful of variants: one `IntoResponse` impl, one JSON
//! `{"error": ...}` body shape, status chosen from `ShannonError::kind()`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use shannon_core::error::ShannonError;
use shannon_workflow::engine::EngineError;

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error(transparent)]
    Shannon(#[from] ShannonError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("not found: {0}")]
    NotFound(String),
}

impl DaemonError {
    fn status(&self) -> StatusCode {
        match self {
            DaemonError::NotFound(_) => StatusCode::NOT_FOUND,
            DaemonError::Shannon(e) => status_for_kind(e.kind()),
            DaemonError::Engine(EngineError::Shannon(e)) => status_for_kind(e.kind()),
            DaemonError::Engine(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn status_for_kind(kind: &str) -> StatusCode {
    match kind {
        "validation" => StatusCode::BAD_REQUEST,
        "not_found" => StatusCode::NOT_FOUND,
        "conflict" => StatusCode::CONFLICT,
        "policy_denied" => StatusCode::FORBIDDEN,
        "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
        "budget_exceeded" => StatusCode::PAYLOAD_TOO_LARGE,
        "cancelled" => StatusCode::CONFLICT,
        "timeout" => StatusCode::GATEWAY_TIMEOUT,
        "dependency_unavailable" => StatusCode::SERVICE_UNAVAILABLE,
        "plan_invalid" => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for DaemonError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_denied_maps_to_forbidden() {
        let err = DaemonError::Shannon(ShannonError::PolicyDenied("nope".into()));
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn not_found_maps_to_404() {
        let err = DaemonError::NotFound("task".into());
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn rate_limited_maps_to_429() {
        let err = DaemonError::Shannon(ShannonError::RateLimited { retry_after_ms: 10 });
        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
