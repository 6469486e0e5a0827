//! Vector memory (spec §4.6, C6): similarity search and session-scoped
//! retrieval over embeddings of historical queries/tasks.
//!
//! Same `rusqlite` + `sqlite-vec` combination and `vec0` virtual-table
//! shape as other chat-memory stores, generalized from chat-memory chunks
//! to the workflow engine's `VectorPoint{id, vector, payload}` contract and
//! wired through `shannon_harness::ports::VectorStorePort` like every other
//! adapter in this workspace.

pub mod adapter;
pub mod db;
pub mod types;

pub use adapter::SqliteVectorStore;
pub use db::MemoryDatabase;
pub use types::{DimensionMismatch, MemoryConfig, MemoryError, MemoryResult, SimilarityHit, VectorPoint};
