//! DAG scheduler (spec §4.7, C7).
//!
//! Given a set of `AgentTask`s with `dependencies`, produce a topological
//! order via Kahn's algorithm or report a cycle, then gate execution with a
//! small synchronous `ready`/`complete` state machine. No async, no I/O —
//! this is deliberately a plain data structure driven from inside the
//! workflow engine's single logical thread of control (spec §4.7 "ADD").

pub mod dag;

pub use dag::{
    CycleReport, DependencyFailurePolicy, NodeState, Scheduler, SchedulerWarning, TopoSortResult,
};
