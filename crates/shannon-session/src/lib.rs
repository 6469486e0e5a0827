//! Session store (spec §4.5, C5): durable multi-turn `SessionContext` with
//! monotonic token/cost aggregation and a bounded, sliding recent-task
//! history.
//!
//! Grounded on `shannon-core::store::TaskStore`'s `tokio_rusqlite` actor
//! convention (spec §5 "dedicated blocking pool" — every blocking
//! `rusqlite` call runs on the connection actor's own thread, never on the
//! async executor) and on `shannon-memory`'s adapter-over-database split.
//! A single `tokio_rusqlite::Connection` serializes all writes through its
//! internal actor, which already satisfies spec §5's "per-session
//! serialization, reads lock-free" requirement without a separate per-key
//! lock table.

pub mod adapter;
pub mod db;

pub use adapter::SqliteSessionStore;
pub use db::{SessionStore, SessionStoreConfig};
