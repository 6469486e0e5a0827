//! Types for the vector memory component (spec §4.6, C6).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Default embedding width used when a deployment does not override it via
/// `MemoryConfig::expected_embedding_dim`. Matches the common
/// all-MiniLM-L6-v2 dimensionality.
pub const DEFAULT_EMBEDDING_DIM: usize = 384;

/// A stored point: an embedding plus its opaque payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorPoint {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: serde_json::Value,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<Uuid>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityHit {
    pub payload: serde_json::Value,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionMismatch {
    pub collection: String,
    pub expected: usize,
    pub actual: usize,
    pub suggested_action: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    pub expected_embedding_dim: usize,
    pub db_path: std::path::PathBuf,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            expected_embedding_dim: DEFAULT_EMBEDDING_DIM,
            db_path: std::path::PathBuf::from("shannon-memory.sqlite3"),
        }
    }
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("dimension mismatch: expected {0} got {1}")]
    DimensionMismatch(usize, usize),

    #[error("point not found: {0}")]
    NotFound(Uuid),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal: {0}")]
    Internal(String),
}

pub type MemoryResult<T> = Result<T, MemoryError>;
