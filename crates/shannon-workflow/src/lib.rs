//! The workflow engine (C8): the durable, signal-driven state machine that
//! composes C1–C7 to execute one `TaskRequest` end to end (spec §4.8).
//!
//! - `state_machine` — the fixed phase-transition table
//!   (NEW→ROUTING→...→{COMPLETED,FAILED,CANCELLED}).
//! - `supervisor` — live `ControlState` per workflow, with pause/resume/cancel
//!   fan-out to children.
//! - `retry` — bounded exponential backoff for transient downstream errors.
//! - `engine` — the phase-by-phase driver that ties the above to the port
//!   traits in `shannon_harness::ports`.

pub mod engine;
pub mod retry;
pub mod state_machine;
pub mod supervisor;

pub use engine::{WorkflowEngine, WorkflowEngineConfig, WorkflowOutcome};
