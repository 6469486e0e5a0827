//! The process that binds the workflow engine to the outside world (spec
//! §6 "External interfaces"): a submit-task/session HTTP API plus an SSE
//! event stream, composing every named port behind concrete in-process
//! adapters.

pub mod adapters;
pub mod config;
pub mod daemon;
pub mod errors;
pub mod handlers;
pub mod router;
pub mod sse;
pub mod state;

pub use config::DaemonConfig;
pub use daemon::Daemon;
pub use state::AppState;
