//! Wires every component (C1-C8) behind the named ports into one
//! `AppState`, and serves it over HTTP (spec §6 "External interfaces").
//!
//! Construction order follows the usual daemon bootstrap shape: open
//! storage, load the hot-reloadable registries, build the in-process
//! adapters, then hand everything to `WorkflowEngine::new`. Nothing here is
//! itself a port — this is the one place in the crate allowed to know about
//! every concrete adapter at once.

use std::sync::Arc;

use dashmap::DashMap;

use shannon_core::store::TaskStore;
use shannon_eventstream::event_bus::EventStreamRegistry;
use shannon_harness::circuit_breaker::{CircuitBreakerConfig, CircuitBreakerRegistry};
use shannon_harness::shutdown::ShutdownSignal;
use shannon_memory::db::MemoryDatabase;
use shannon_memory::adapter::SqliteVectorStore;
use shannon_policy::PolicyEngine;
use shannon_pricing::registry::PricingRegistry;
use shannon_session::adapter::SqliteSessionStore;
use shannon_session::db::{SessionStore, SessionStoreConfig};
use shannon_workflow::engine::{WorkflowEngine, WorkflowEngineConfig};
use shannon_workflow::supervisor::WorkflowSupervisor;

use crate::adapters::{HttpAgentExecutor, HttpPlanner, StubAgentExecutor, StubPlanner};
use crate::config::DaemonConfig;
use crate::router::build_router;
use crate::state::AppState;

/// The running process: HTTP router plus the shutdown coordinator that
/// replaces a lockfile/SIGTERM `--replace` dance with cooperative
/// broadcast-based shutdown (spec §9 redesign note).
pub struct Daemon {
    state: AppState,
    shutdown: ShutdownSignal,
}

impl Daemon {
    pub async fn new(config: DaemonConfig) -> anyhow::Result<Self> {
        let tasks = Arc::new(match &config.task_store_path {
            Some(path) => TaskStore::open(path).await?,
            None => TaskStore::open_in_memory().await?,
        });

        let session_store = match &config.session_store_path {
            Some(path) => SessionStore::open(path, SessionStoreConfig::default()).await?,
            None => SessionStore::open_in_memory(SessionStoreConfig::default()).await?,
        };
        let sessions = Arc::new(SqliteSessionStore::new(session_store));

        let memory_db = match &config.memory_store_path {
            Some(path) => MemoryDatabase::open(path, config.expected_embedding_dim).await?,
            None => MemoryDatabase::open_in_memory(config.expected_embedding_dim).await?,
        };
        let memory = Arc::new(SqliteVectorStore::new(memory_db));

        let pricing = Arc::new(PricingRegistry::load_or_default(
            config.pricing_config_path.clone(),
        ));
        let policy = Arc::new(PolicyEngine::load_or_default(
            config.policy_config_path.clone(),
        ));
        let events = Arc::new(EventStreamRegistry::default());
        let breakers = Arc::new(CircuitBreakerRegistry::new(CircuitBreakerConfig::default()));
        let supervisor = Arc::new(WorkflowSupervisor::new());

        let planner: Arc<dyn shannon_harness::ports::Planner> = match &config.planner_url {
            Some(url) => Arc::new(HttpPlanner::new(url.clone())),
            None => Arc::new(StubPlanner),
        };
        let agent_executor: Arc<dyn shannon_harness::ports::AgentExecutor> =
            match &config.agent_executor_url {
                Some(url) => Arc::new(HttpAgentExecutor::new(url.clone())),
                None => Arc::new(StubAgentExecutor),
            };

        let engine = Arc::new(WorkflowEngine::new(
            events.clone(),
            sessions.clone(),
            memory.clone(),
            agent_executor,
            planner,
            policy.clone(),
            pricing.clone(),
            breakers,
            supervisor.clone(),
            WorkflowEngineConfig {
                task_deadline: std::time::Duration::from_secs(config.task_deadline_secs),
                ..Default::default()
            },
        ));

        let state = AppState {
            engine,
            events,
            sessions,
            supervisor,
            tasks,
            config: Arc::new(config),
            workflow_of_task: Arc::new(DashMap::new()),
        };

        Ok(Self {
            state,
            shutdown: ShutdownSignal::new(),
        })
    }

    pub fn config(&self) -> &DaemonConfig {
        &self.state.config
    }

    pub fn shutdown_handle(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Serve the router on `listener` until shutdown is triggered.
    pub async fn run_with_listener(self, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
        let router = build_router(self.state);
        let mut shutdown_rx = self.shutdown.subscribe();

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn builds_with_in_memory_defaults() {
        let daemon = Daemon::new(DaemonConfig::default()).await.unwrap();
        assert_eq!(daemon.config().port, 8088);
    }
}
