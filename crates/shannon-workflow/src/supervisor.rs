//! Control-state supervision for live workflows (spec §4.8 "Signals" /
//! "Signal propagation").
//!
//! Generalizes an `AgentSupervisor`-style `DashMap`-backed registry
//! keyed by id, each entry owning its own state — into a registry of
//! `ControlState` per workflow. Parent/child fan-out replaces the source's
//! cyclic references with a one-way registry of child ids held by the
//! parent (spec §9 redesign note); a signal is forwarded by id lookup, never
//! by a shared back-reference, so there is no lifetime cycle between parent
//! and child handles.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{Mutex, Notify};
use uuid::Uuid;

use shannon_core::model::ControlState;

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("workflow not registered: {0}")]
    NotFound(Uuid),
}

pub type Result<T> = std::result::Result<T, SupervisorError>;

/// Per-workflow bookkeeping: the control state signals mutate, a `Notify`
/// pause-checkpoints block on, and the ids of any child workflows spawned
/// from this one.
struct WorkflowHandle {
    control: Mutex<ControlState>,
    notify: Notify,
    children: Mutex<Vec<Uuid>>,
    /// Child workflows suppress their own top-level lifecycle emissions
    /// (spec §4.8 "children suppress their own top-level lifecycle
    /// emissions to avoid duplicates") — the engine consults this via
    /// `is_child`.
    is_child: bool,
}

impl WorkflowHandle {
    fn new(is_child: bool) -> Self {
        Self {
            control: Mutex::new(ControlState::default()),
            notify: Notify::new(),
            children: Mutex::new(Vec::new()),
            is_child,
        }
    }
}

/// Registry of live workflows' control state, addressable by workflow id.
#[derive(Default)]
pub struct WorkflowSupervisor {
    workflows: DashMap<Uuid, Arc<WorkflowHandle>>,
}

impl WorkflowSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new workflow. `parent` is `Some` when this workflow was
    /// spawned as a child of another (e.g. a sub-plan dispatched from a
    /// parent task); the parent's child registry records the new id so
    /// signals fan out to it.
    pub async fn register(&self, workflow_id: Uuid, parent: Option<Uuid>) -> Result<()> {
        let is_child = parent.is_some();
        self.workflows
            .insert(workflow_id, Arc::new(WorkflowHandle::new(is_child)));
        if let Some(parent_id) = parent {
            let parent_handle = self
                .workflows
                .get(&parent_id)
                .ok_or(SupervisorError::NotFound(parent_id))?
                .clone();
            let mut children = parent_handle.children.lock().await;
            children.push(workflow_id);
        }
        Ok(())
    }

    pub fn unregister(&self, workflow_id: Uuid) {
        self.workflows.remove(&workflow_id);
    }

    fn handle(&self, workflow_id: Uuid) -> Result<Arc<WorkflowHandle>> {
        self.workflows
            .get(&workflow_id)
            .map(|h| h.clone())
            .ok_or(SupervisorError::NotFound(workflow_id))
    }

    pub async fn control_state(&self, workflow_id: Uuid) -> Result<ControlState> {
        let handle = self.handle(workflow_id)?;
        Ok(handle.control.lock().await.clone())
    }

    pub fn is_child(&self, workflow_id: Uuid) -> bool {
        self.workflows
            .get(&workflow_id)
            .map(|h| h.is_child)
            .unwrap_or(false)
    }

    /// Pause `workflow_id` and recursively fan out to every registered
    /// child (spec §4.8 "pause/resume/cancel must fan out to any child
    /// workflows").
    pub async fn pause(&self, workflow_id: Uuid, reason: String, requested_by: String) -> Result<()> {
        let handle = self.handle(workflow_id)?;
        {
            let mut control = handle.control.lock().await;
            control.is_paused = true;
            control.paused_at = Some(Utc::now());
            control.pause_reason = Some(reason.clone());
            control.paused_by = Some(requested_by.clone());
        }
        for child in Self::children_of(&handle).await {
            Box::pin(self.pause(child, reason.clone(), requested_by.clone())).await?;
        }
        Ok(())
    }

    pub async fn resume(&self, workflow_id: Uuid, requested_by: String) -> Result<()> {
        let handle = self.handle(workflow_id)?;
        {
            let mut control = handle.control.lock().await;
            control.is_paused = false;
            control.paused_at = None;
            control.pause_reason = None;
            control.paused_by = None;
        }
        handle.notify.notify_waiters();
        for child in Self::children_of(&handle).await {
            Box::pin(self.resume(child, requested_by.clone())).await?;
        }
        Ok(())
    }

    pub async fn cancel(
        &self,
        workflow_id: Uuid,
        reason: String,
        requested_by: String,
    ) -> Result<()> {
        let handle = self.handle(workflow_id)?;
        {
            let mut control = handle.control.lock().await;
            control.is_cancelled = true;
            control.cancel_reason = Some(reason.clone());
            control.cancelled_by = Some(requested_by.clone());
        }
        handle.notify.notify_waiters();
        for child in Self::children_of(&handle).await {
            Box::pin(self.cancel(child, reason.clone(), requested_by.clone())).await?;
        }
        Ok(())
    }

    async fn children_of(handle: &WorkflowHandle) -> Vec<Uuid> {
        handle.children.lock().await.clone()
    }

    /// Block until `!is_paused || is_cancelled` (spec §4.8 checkpoint
    /// contract). Returns the control state observed on wake.
    pub async fn wait_while_paused(&self, workflow_id: Uuid) -> Result<ControlState> {
        let handle = self.handle(workflow_id)?;
        loop {
            let snapshot = handle.control.lock().await.clone();
            if !snapshot.is_paused || snapshot.is_cancelled {
                return Ok(snapshot);
            }
            handle.notify.notified().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pause_and_resume_round_trip() {
        let sup = WorkflowSupervisor::new();
        let id = Uuid::new_v4();
        sup.register(id, None).await.unwrap();
        sup.pause(id, "operator request".into(), "alice".into())
            .await
            .unwrap();
        assert!(sup.control_state(id).await.unwrap().is_paused);
        sup.resume(id, "alice".into()).await.unwrap();
        assert!(!sup.control_state(id).await.unwrap().is_paused);
    }

    #[tokio::test]
    async fn cancel_propagates_to_children() {
        let sup = WorkflowSupervisor::new();
        let parent = Uuid::new_v4();
        let child = Uuid::new_v4();
        sup.register(parent, None).await.unwrap();
        sup.register(child, Some(parent)).await.unwrap();
        assert!(sup.is_child(child));
        assert!(!sup.is_child(parent));

        sup.cancel(parent, "user cancelled".into(), "bob".into())
            .await
            .unwrap();
        assert!(sup.control_state(parent).await.unwrap().is_cancelled);
        assert!(sup.control_state(child).await.unwrap().is_cancelled);
    }

    #[tokio::test]
    async fn wait_while_paused_unblocks_on_resume() {
        let sup = Arc::new(WorkflowSupervisor::new());
        let id = Uuid::new_v4();
        sup.register(id, None).await.unwrap();
        sup.pause(id, "r".into(), "op".into()).await.unwrap();

        let waiter = {
            let sup = sup.clone();
            tokio::spawn(async move { sup.wait_while_paused(id).await.unwrap() })
        };
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        sup.resume(id, "op".into()).await.unwrap();
        let state = waiter.await.unwrap();
        assert!(!state.is_paused);
    }

    #[tokio::test]
    async fn unknown_workflow_is_reported() {
        let sup = WorkflowSupervisor::new();
        let err = sup.control_state(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, SupervisorError::NotFound(_)));
    }
}
