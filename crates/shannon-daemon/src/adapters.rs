//! Planner and agent-executor adapters.
//!
//! Both capabilities are explicitly out of scope as implementations (spec
//! §1: "an LLM provider adapter ... is treated as a remote call", "an agent
//! executor that actually runs tasks is out of scope"). Follows the same
//! stub-provider placeholder shape: a stub that always reports
//! `dependency_unavailable` wired in by default, and a thin `reqwest`-based
//! HTTP adapter that activates once a base URL is configured.

use async_trait::async_trait;

use shannon_core::error::{ShannonError, ShannonResult};
use shannon_core::model::{AgentResult, AgentTask, ComplexityScore, SessionContext};
use shannon_harness::ports::{AgentExecutor, Planner};

// ---------------------------------------------------------------------------
// Stubs — zero-config default
// ---------------------------------------------------------------------------

/// Always returns `DependencyUnavailable`. Retryable by design, so a
/// workflow run against an unconfigured planner fails the same way it would
/// against a real planner that happens to be down.
#[derive(Debug, Clone, Default)]
pub struct StubPlanner;

#[async_trait]
impl Planner for StubPlanner {
    async fn plan(&self, _query: &str, _session: &SessionContext) -> ShannonResult<ComplexityScore> {
        Err(ShannonError::DependencyUnavailable(
            "planner is not configured — set `planner_url` to a live service".to_string(),
        ))
    }
}

#[derive(Debug, Clone, Default)]
pub struct StubAgentExecutor;

#[async_trait]
impl AgentExecutor for StubAgentExecutor {
    async fn execute(&self, _task: AgentTask) -> ShannonResult<AgentResult> {
        Err(ShannonError::DependencyUnavailable(
            "agent executor is not configured — set `agent_executor_url` to a live service"
                .to_string(),
        ))
    }
}

// ---------------------------------------------------------------------------
// HTTP adapters — activated once a base URL is configured
// ---------------------------------------------------------------------------

/// Calls `POST {base_url}/plan` with `{query, session}` and expects a JSON
/// `ComplexityScore` body back.
pub struct HttpPlanner {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPlanner {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }
}

#[async_trait]
impl Planner for HttpPlanner {
    async fn plan(&self, query: &str, session: &SessionContext) -> ShannonResult<ComplexityScore> {
        let url = format!("{}/plan", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({ "query": query, "session": session });
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ShannonError::DependencyUnavailable(format!("planner request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(ShannonError::DependencyUnavailable(format!(
                "planner returned status {}",
                response.status()
            )));
        }

        response
            .json::<ComplexityScore>()
            .await
            .map_err(|e| ShannonError::DependencyUnavailable(format!("malformed planner response: {e}")))
    }
}

/// Calls `POST {base_url}/execute` with the `AgentTask` body and expects a
/// JSON `AgentResult` back.
pub struct HttpAgentExecutor {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAgentExecutor {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }
}

#[async_trait]
impl AgentExecutor for HttpAgentExecutor {
    async fn execute(&self, task: AgentTask) -> ShannonResult<AgentResult> {
        let url = format!("{}/execute", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(&task)
            .send()
            .await
            .map_err(|e| ShannonError::DependencyUnavailable(format!("agent executor request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(ShannonError::DependencyUnavailable(format!(
                "agent executor returned status {}",
                response.status()
            )));
        }

        response
            .json::<AgentResult>()
            .await
            .map_err(|e| {
                ShannonError::DependencyUnavailable(format!("malformed agent executor response: {e}"))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shannon_core::model::SessionContext;
    use uuid::Uuid;

    #[tokio::test]
    async fn stub_planner_reports_dependency_unavailable() {
        let planner = StubPlanner;
        let session = SessionContext::new(Uuid::new_v4(), "user-1");
        let err = planner.plan("hi", &session).await.unwrap_err();
        assert_eq!(err.kind(), "dependency_unavailable");
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn stub_agent_executor_reports_dependency_unavailable() {
        let executor = StubAgentExecutor;
        let task = AgentTask {
            id: "root".into(),
            description: "do work".into(),
            dependencies: Vec::new(),
            mode: "standard".into(),
            model_tier: shannon_core::model::ModelTier::Small,
        };
        let err = executor.execute(task).await.unwrap_err();
        assert_eq!(err.kind(), "dependency_unavailable");
    }
}
