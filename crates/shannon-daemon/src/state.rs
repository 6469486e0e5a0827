//! Shared application state composing every port and infra handle the HTTP
//! layer needs (spec §6 "External interfaces").
//!
//! The workflow engine only ever sees narrow `shannon_harness::ports` trait
//! objects; `AppState` additionally keeps the concrete handles the daemon's
//! own handlers need beyond what the engine exposes — direct session
//! listing, task-record lookups, and control-state queries for signals.

use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use shannon_core::store::TaskStore;
use shannon_eventstream::event_bus::EventStreamRegistry;
use shannon_session::adapter::SqliteSessionStore;
use shannon_workflow::engine::WorkflowEngine;
use shannon_workflow::supervisor::WorkflowSupervisor;

use crate::config::DaemonConfig;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<WorkflowEngine>,
    pub events: Arc<EventStreamRegistry>,
    pub sessions: Arc<SqliteSessionStore>,
    pub supervisor: Arc<WorkflowSupervisor>,
    pub tasks: Arc<TaskStore>,
    pub config: Arc<DaemonConfig>,
    /// `task_id -> workflow_id`. A task id is the public handle callers
    /// submit and poll against; the workflow id is what the supervisor and
    /// event stream key off internally (one task always maps to exactly one
    /// top-level workflow, see DESIGN.md).
    pub workflow_of_task: Arc<DashMap<Uuid, Uuid>>,
}

impl AppState {
    pub fn workflow_id_for(&self, task_id: Uuid) -> Option<Uuid> {
        self.workflow_of_task.get(&task_id).map(|v| *v)
    }
}
