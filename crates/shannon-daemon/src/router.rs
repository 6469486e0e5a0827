//! Assembles the axum router for the external interfaces (spec §6).
//!
//! Route layout: `/tasks` for submit/status/signals/SSE events, `/sessions`
//! for the session API. Layered with request-id propagation and metrics
//! via `shannon-telemetry`'s middleware, plus tracing and CORS from
//! `tower-http`.

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use shannon_telemetry::middleware::metrics_middleware;
use shannon_telemetry::tracing_setup::request_id_middleware;

use crate::handlers;
use crate::sse;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let cors = build_cors(&state.config.cors_allowed_origins);

    Router::new()
        .route("/tasks", post(handlers::submit_task))
        .route("/tasks/{task_id}", get(handlers::get_task_status))
        .route("/tasks/{task_id}/cancel", post(handlers::cancel_task))
        .route("/tasks/{task_id}/pause", post(handlers::pause_task))
        .route("/tasks/{task_id}/resume", post(handlers::resume_task))
        .route("/tasks/{task_id}/events", get(sse::subscribe))
        .route(
            "/sessions",
            post(handlers::create_session).get(handlers::list_sessions),
        )
        .route(
            "/sessions/{session_id}",
            get(handlers::get_session).delete(handlers::delete_session),
        )
        .route("/sessions/{session_id}/messages", post(handlers::add_message))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(axum::middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn build_cors(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }
    let parsed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(parsed))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}
