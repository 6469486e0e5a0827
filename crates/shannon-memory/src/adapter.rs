//! Adapts `MemoryDatabase` to `shannon_harness::ports::VectorStorePort`,
//! translating between the engine-facing `ShannonResult` contract and the
//! crate's own `MemoryError`.

use async_trait::async_trait;
use uuid::Uuid;

use shannon_core::error::{ShannonError, ShannonResult};
use shannon_harness::ports::VectorStorePort;

use crate::db::MemoryDatabase;
use crate::types::VectorPoint;

pub struct SqliteVectorStore {
    db: MemoryDatabase,
    expected_dim: usize,
}

impl SqliteVectorStore {
    pub fn new(db: MemoryDatabase) -> Self {
        let expected_dim = db.dim();
        Self { db, expected_dim }
    }

    /// Structured dimension-mismatch error (spec §4.6): `{collection,
    /// expected, actual, suggested_action}`, surfaced as a `Validation`
    /// error since it is a hard, non-retryable rejection of the write.
    fn dimension_error(&self, actual: usize) -> ShannonError {
        let detail = serde_json::json!({
            "collection": "memory_vectors",
            "expected": self.expected_dim,
            "actual": actual,
            "suggested_action": format!(
                "re-embed with a model producing {}-dimensional vectors, or reconfigure expected_embedding_dim",
                self.expected_dim
            ),
        });
        ShannonError::Validation(detail.to_string())
    }
}

#[async_trait]
impl VectorStorePort for SqliteVectorStore {
    async fn find_similar(
        &self,
        embedding: Vec<f32>,
        limit: usize,
        threshold: f32,
        tenant_id: Option<String>,
    ) -> ShannonResult<Vec<serde_json::Value>> {
        if embedding.len() != self.expected_dim {
            return Err(self.dimension_error(embedding.len()));
        }
        let hits = self
            .db
            .search_similar(embedding, limit, tenant_id)
            .await
            .map_err(|e| ShannonError::Internal(e.to_string()))?;

        Ok(hits
            .into_iter()
            .filter_map(|(_, payload, distance)| {
                // sqlite-vec reports squared L2 distance for normalized
                // vectors; fold it into a [0,1]-ish confidence score so
                // callers can apply `threshold` uniformly.
                let confidence = (1.0 - (distance / 2.0)).clamp(0.0, 1.0);
                if confidence < threshold as f64 {
                    return None;
                }
                let mut payload = payload;
                if let serde_json::Value::Object(ref mut map) = payload {
                    map.insert("confidence".to_string(), serde_json::json!(confidence));
                }
                Some(payload)
            })
            .collect())
    }

    async fn session_context(
        &self,
        session_id: Uuid,
        tenant_id: Option<String>,
        top_k: usize,
    ) -> ShannonResult<Vec<serde_json::Value>> {
        let rows = self
            .db
            .session_points(session_id, tenant_id, top_k)
            .await
            .map_err(|e| ShannonError::Internal(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|(payload, _created_at)| {
                serde_json::json!({ "payload": payload, "score": 1.0 })
            })
            .collect())
    }

    async fn upsert(&self, point: serde_json::Value) -> ShannonResult<()> {
        let point: VectorPoint = serde_json::from_value(point)
            .map_err(|e| ShannonError::Validation(format!("invalid vector point: {e}")))?;
        if point.vector.len() != self.expected_dim {
            return Err(self.dimension_error(point.vector.len()));
        }
        self.db
            .upsert(point)
            .await
            .map_err(|e| ShannonError::Internal(e.to_string()))
    }

    async fn delete(&self, id: Uuid) -> ShannonResult<()> {
        self.db
            .delete(id)
            .await
            .map_err(|e| ShannonError::Internal(e.to_string()))
    }
}
