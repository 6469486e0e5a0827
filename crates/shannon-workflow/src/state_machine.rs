//! The workflow engine's own state machine (spec §4.8): `NEW → ROUTING →
//! PLANNING → SCHEDULING → DISPATCHING ⇄ AGGREGATING → FINALIZING →
//! {COMPLETED, FAILED, CANCELLED}`. `PAUSED`/`CANCELLING` are superimposed
//! control states tracked separately by `crate::supervisor`, not phases of
//! this machine.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// WorkflowPhase
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowPhase {
    New,
    Routing,
    Planning,
    Scheduling,
    Dispatching,
    Aggregating,
    Finalizing,
    Completed,
    Failed,
    Cancelled,
}

impl fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WorkflowPhase::New => "New",
            WorkflowPhase::Routing => "Routing",
            WorkflowPhase::Planning => "Planning",
            WorkflowPhase::Scheduling => "Scheduling",
            WorkflowPhase::Dispatching => "Dispatching",
            WorkflowPhase::Aggregating => "Aggregating",
            WorkflowPhase::Finalizing => "Finalizing",
            WorkflowPhase::Completed => "Completed",
            WorkflowPhase::Failed => "Failed",
            WorkflowPhase::Cancelled => "Cancelled",
        };
        write!(f, "{}", label)
    }
}

impl WorkflowPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            WorkflowPhase::Completed | WorkflowPhase::Failed | WorkflowPhase::Cancelled
        )
    }
}

// ---------------------------------------------------------------------------
// WorkflowEvent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowEvent {
    Route,
    Plan,
    Schedule,
    Dispatch,
    /// All ready tasks dispatched; wait for results.
    AwaitResults,
    /// A result arrived; there is more work left to schedule/dispatch.
    MoreWork,
    /// A result arrived and every node is terminal; proceed to finalize.
    AllDone,
    Finalize,
    Complete,
    Fail,
    Cancel,
}

impl fmt::Display for WorkflowEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WorkflowEvent::Route => "Route",
            WorkflowEvent::Plan => "Plan",
            WorkflowEvent::Schedule => "Schedule",
            WorkflowEvent::Dispatch => "Dispatch",
            WorkflowEvent::AwaitResults => "AwaitResults",
            WorkflowEvent::MoreWork => "MoreWork",
            WorkflowEvent::AllDone => "AllDone",
            WorkflowEvent::Finalize => "Finalize",
            WorkflowEvent::Complete => "Complete",
            WorkflowEvent::Fail => "Fail",
            WorkflowEvent::Cancel => "Cancel",
        };
        write!(f, "{}", label)
    }
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Errors raised when an event is applied that the current phase does not
/// accept.
///
/// `Fail` and `Cancel` are valid from every non-terminal phase (spec §4.8
/// "checkpoints ... if is_cancelled ... distinct from failure"); every other
/// transition follows the fixed phase order.
#[derive(Debug, thiserror::Error)]
pub enum StateMachineError {
    #[error("invalid transition: cannot apply {event} in phase {phase}")]
    InvalidTransition {
        phase: WorkflowPhase,
        event: WorkflowEvent,
    },
}

// ---------------------------------------------------------------------------
// WorkflowStateMachine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct WorkflowStateMachine {
    current: WorkflowPhase,
    history: Vec<(WorkflowPhase, WorkflowEvent, WorkflowPhase)>,
}

impl WorkflowStateMachine {
    pub fn new() -> Self {
        Self {
            current: WorkflowPhase::New,
            history: Vec::new(),
        }
    }

    pub fn phase(&self) -> WorkflowPhase {
        self.current
    }

    pub fn history(&self) -> &[(WorkflowPhase, WorkflowEvent, WorkflowPhase)] {
        &self.history
    }

    /// Attempt a phase transition driven by `event`.
    ///
    /// Valid transitions:
    /// - New         + Route        -> Routing
    /// - Routing     + Plan         -> Planning
    /// - Planning    + Schedule     -> Scheduling
    /// - Scheduling  + Dispatch     -> Dispatching
    /// - Dispatching + AwaitResults -> Aggregating
    /// - Aggregating + MoreWork     -> Dispatching
    /// - Aggregating + AllDone      -> Finalizing
    /// - Finalizing  + Complete     -> Completed
    /// - *(non-terminal)* + Fail    -> Failed
    /// - *(non-terminal)* + Cancel  -> Cancelled
    pub fn transition(&mut self, event: WorkflowEvent) -> Result<WorkflowPhase, StateMachineError> {
        let next = match (self.current, event) {
            (_, WorkflowEvent::Fail) if !self.current.is_terminal() => WorkflowPhase::Failed,
            (_, WorkflowEvent::Cancel) if !self.current.is_terminal() => WorkflowPhase::Cancelled,
            (WorkflowPhase::New, WorkflowEvent::Route) => WorkflowPhase::Routing,
            (WorkflowPhase::Routing, WorkflowEvent::Plan) => WorkflowPhase::Planning,
            (WorkflowPhase::Planning, WorkflowEvent::Schedule) => WorkflowPhase::Scheduling,
            (WorkflowPhase::Scheduling, WorkflowEvent::Dispatch) => WorkflowPhase::Dispatching,
            (WorkflowPhase::Dispatching, WorkflowEvent::AwaitResults) => WorkflowPhase::Aggregating,
            (WorkflowPhase::Aggregating, WorkflowEvent::MoreWork) => WorkflowPhase::Dispatching,
            (WorkflowPhase::Aggregating, WorkflowEvent::AllDone) => WorkflowPhase::Finalizing,
            (WorkflowPhase::Finalizing, WorkflowEvent::Complete) => WorkflowPhase::Completed,
            _ => {
                return Err(StateMachineError::InvalidTransition {
                    phase: self.current,
                    event,
                });
            }
        };

        let from = self.current;
        self.current = next;
        self.history.push((from, event, next));
        tracing::debug!(from = %from, event = %event, to = %next, "workflow phase transition");
        Ok(next)
    }

    pub fn can_transition(&self, event: WorkflowEvent) -> bool {
        if !self.current.is_terminal()
            && matches!(event, WorkflowEvent::Fail | WorkflowEvent::Cancel)
        {
            return true;
        }
        matches!(
            (self.current, event),
            (WorkflowPhase::New, WorkflowEvent::Route)
                | (WorkflowPhase::Routing, WorkflowEvent::Plan)
                | (WorkflowPhase::Planning, WorkflowEvent::Schedule)
                | (WorkflowPhase::Scheduling, WorkflowEvent::Dispatch)
                | (WorkflowPhase::Dispatching, WorkflowEvent::AwaitResults)
                | (WorkflowPhase::Aggregating, WorkflowEvent::MoreWork)
                | (WorkflowPhase::Aggregating, WorkflowEvent::AllDone)
                | (WorkflowPhase::Finalizing, WorkflowEvent::Complete)
        )
    }
}

impl Default for WorkflowStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
