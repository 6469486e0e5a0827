//! Harness — named port traits and reliability infrastructure shared by
//! every component that talks to an external dependency (spec §9).
//!
//! This crate provides the seam between the workflow engine and the
//! concrete stores/executors it depends on:
//! - Named async port traits (`EventSink`, `SessionStorePort`, ...)
//! - Circuit breaker (closed/open/half-open) with a per-dependency registry
//! - Token-bucket rate limiter (ambient; distinct from C1's pricing-derived delay)
//! - Cooperative shutdown coordination

pub mod circuit_breaker;
pub mod ports;
pub mod rate_limiter;
pub mod shutdown;
