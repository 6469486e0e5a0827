//! SQLite + `sqlite-vec` backed storage for vector points.
//!
//! Uses the same `vec0` virtual-table schema and `search_similar` query
//! shape common to `sqlite-vec`-backed memory stores, adapted to
//! `shannon-core`'s `tokio_rusqlite::Connection` actor convention (spec §5
//! "dedicated blocking pool") rather than a bare `tokio::sync::Mutex<Connection>`.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{ffi::sqlite3_auto_extension, params};
use sqlite_vec::sqlite3_vec_init;
use uuid::Uuid;

use crate::types::{MemoryError, MemoryResult, VectorPoint};

/// Registers the `sqlite-vec` loadable extension process-wide. Safe to call
/// more than once; SQLite deduplicates identical `sqlite3_auto_extension`
/// registrations.
fn register_vec_extension() {
    unsafe {
        sqlite3_auto_extension(Some(std::mem::transmute::<
            *const (),
            unsafe extern "C" fn(
                *mut rusqlite::ffi::sqlite3,
                *mut *mut i8,
                *const rusqlite::ffi::sqlite3_api_routines,
            ) -> i32,
        >(sqlite3_vec_init as *const ())));
    }
}

pub struct MemoryDatabase {
    conn: tokio_rusqlite::Connection,
    dim: usize,
}

impl MemoryDatabase {
    pub async fn open(path: impl AsRef<Path>, dim: usize) -> MemoryResult<Self> {
        register_vec_extension();
        let conn = tokio_rusqlite::Connection::open(path.as_ref())
            .await
            .map_err(|e| MemoryError::Internal(e.to_string()))?;
        let db = Self { conn, dim };
        db.init_schema().await?;
        Ok(db)
    }

    pub async fn open_in_memory(dim: usize) -> MemoryResult<Self> {
        register_vec_extension();
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(|e| MemoryError::Internal(e.to_string()))?;
        let db = Self { conn, dim };
        db.init_schema().await?;
        Ok(db)
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    async fn init_schema(&self) -> MemoryResult<()> {
        let dim = self.dim;
        self.conn
            .call(move |conn| {
                conn.execute_batch(
                    "PRAGMA journal_mode=WAL;
                     PRAGMA synchronous=NORMAL;
                     PRAGMA busy_timeout=5000;

                     CREATE TABLE IF NOT EXISTS memory_points (
                        id TEXT PRIMARY KEY,
                        tenant_id TEXT,
                        session_id TEXT,
                        payload TEXT NOT NULL,
                        created_at TEXT NOT NULL
                     );

                     CREATE INDEX IF NOT EXISTS idx_memory_points_tenant
                        ON memory_points(tenant_id);
                     CREATE INDEX IF NOT EXISTS idx_memory_points_session
                        ON memory_points(session_id);",
                )?;
                conn.execute(
                    &format!(
                        "CREATE VIRTUAL TABLE IF NOT EXISTS memory_vectors USING vec0(
                            point_id TEXT PRIMARY KEY,
                            embedding float[{dim}]
                        )"
                    ),
                    [],
                )?;
                Ok(())
            })
            .await
            .map_err(|e| MemoryError::Internal(e.to_string()))
    }

    /// Insert or replace a point. Caller has already validated dimensionality.
    pub async fn upsert(&self, point: VectorPoint) -> MemoryResult<()> {
        let embedding_json = vector_to_json(&point.vector);
        let payload_json = point.payload.to_string();
        let id = point.id.to_string();
        let tenant_id = point.tenant_id.clone();
        let session_id = point.session_id.map(|s| s.to_string());
        let created_at = point.timestamp.to_rfc3339();

        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO memory_points (id, tenant_id, session_id, payload, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(id) DO UPDATE SET
                        tenant_id = excluded.tenant_id,
                        session_id = excluded.session_id,
                        payload = excluded.payload,
                        created_at = excluded.created_at",
                    params![id, tenant_id, session_id, payload_json, created_at],
                )?;
                conn.execute("DELETE FROM memory_vectors WHERE point_id = ?1", params![id])?;
                conn.execute(
                    "INSERT INTO memory_vectors (point_id, embedding) VALUES (?1, ?2)",
                    params![id, embedding_json],
                )?;
                Ok(())
            })
            .await
            .map_err(|e| MemoryError::Internal(e.to_string()))
    }

    pub async fn delete(&self, id: Uuid) -> MemoryResult<()> {
        let id = id.to_string();
        self.conn
            .call(move |conn| {
                conn.execute("DELETE FROM memory_points WHERE id = ?1", params![id])?;
                conn.execute("DELETE FROM memory_vectors WHERE point_id = ?1", params![id])?;
                Ok(())
            })
            .await
            .map_err(|e| MemoryError::Internal(e.to_string()))
    }

    /// KNN search via `vec0`'s `MATCH ... AND k = ?` syntax, optionally
    /// filtered by tenant. Returns `(id, payload, tenant_id, session_id,
    /// created_at, distance)` rows ordered by ascending distance.
    pub async fn search_similar(
        &self,
        embedding: Vec<f32>,
        limit: usize,
        tenant_id: Option<String>,
    ) -> MemoryResult<Vec<(Uuid, serde_json::Value, f64)>> {
        let embedding_json = vector_to_json(&embedding);
        let limit = limit as i64;

        let rows: Vec<(String, String, f64)> = self
            .conn
            .call(move |conn| {
                let rows = match &tenant_id {
                    Some(tid) => {
                        let sql = "SELECT p.id, p.payload, v.distance
                                    FROM memory_vectors AS v
                                    JOIN memory_points AS p ON v.point_id = p.id
                                    WHERE p.tenant_id = ?1 AND v.embedding MATCH ?2 AND k = ?3
                                    ORDER BY v.distance";
                        let mut stmt = conn.prepare(sql)?;
                        stmt.query_map(params![tid, embedding_json, limit], |row| {
                            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, f64>(2)?))
                        })?
                        .collect::<Result<Vec<_>, _>>()?
                    }
                    None => {
                        let sql = "SELECT p.id, p.payload, v.distance
                                    FROM memory_vectors AS v
                                    JOIN memory_points AS p ON v.point_id = p.id
                                    WHERE v.embedding MATCH ?1 AND k = ?2
                                    ORDER BY v.distance";
                        let mut stmt = conn.prepare(sql)?;
                        stmt.query_map(params![embedding_json, limit], |row| {
                            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, f64>(2)?))
                        })?
                        .collect::<Result<Vec<_>, _>>()?
                    }
                };
                Ok(rows)
            })
            .await
            .map_err(|e| MemoryError::Internal(e.to_string()))?;

        rows.into_iter()
            .map(|(id, payload, distance)| {
                let id = Uuid::parse_str(&id).map_err(|e| MemoryError::Internal(e.to_string()))?;
                let payload: serde_json::Value = serde_json::from_str(&payload)?;
                Ok((id, payload, distance))
            })
            .collect()
    }

    /// Filter-only retrieval by session, most recent first.
    pub async fn session_points(
        &self,
        session_id: Uuid,
        tenant_id: Option<String>,
        top_k: usize,
    ) -> MemoryResult<Vec<(serde_json::Value, DateTime<Utc>)>> {
        let sid = session_id.to_string();
        let limit = top_k as i64;

        let rows: Vec<(String, String)> = self
            .conn
            .call(move |conn| {
                let rows = match &tenant_id {
                    Some(tid) => {
                        let mut stmt = conn.prepare(
                            "SELECT payload, created_at FROM memory_points
                             WHERE session_id = ?1 AND tenant_id = ?2
                             ORDER BY created_at DESC LIMIT ?3",
                        )?;
                        stmt.query_map(params![sid, tid, limit], |row| {
                            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                        })?
                        .collect::<Result<Vec<_>, _>>()?
                    }
                    None => {
                        let mut stmt = conn.prepare(
                            "SELECT payload, created_at FROM memory_points
                             WHERE session_id = ?1
                             ORDER BY created_at DESC LIMIT ?2",
                        )?;
                        stmt.query_map(params![sid, limit], |row| {
                            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                        })?
                        .collect::<Result<Vec<_>, _>>()?
                    }
                };
                Ok(rows)
            })
            .await
            .map_err(|e| MemoryError::Internal(e.to_string()))?;

        rows.into_iter()
            .map(|(payload, created_at)| {
                let payload: serde_json::Value = serde_json::from_str(&payload)?;
                let created_at = DateTime::parse_from_rfc3339(&created_at)
                    .map(|d| d.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now());
                Ok((payload, created_at))
            })
            .collect()
    }
}

fn vector_to_json(vector: &[f32]) -> String {
    format!(
        "[{}]",
        vector.iter().map(|f| f.to_string()).collect::<Vec<_>>().join(",")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn point(vector: Vec<f32>, payload: serde_json::Value) -> VectorPoint {
        VectorPoint {
            id: Uuid::new_v4(),
            vector,
            payload,
            tenant_id: None,
            session_id: None,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn upsert_then_search_finds_nearest() {
        let db = MemoryDatabase::open_in_memory(3).await.unwrap();
        let a = point(vec![1.0, 0.0, 0.0], json!({"query": "a"}));
        let b = point(vec![0.0, 1.0, 0.0], json!({"query": "b"}));
        db.upsert(a.clone()).await.unwrap();
        db.upsert(b).await.unwrap();

        let hits = db
            .search_similar(vec![1.0, 0.0, 0.0], 1, None)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, a.id);
    }

    #[tokio::test]
    async fn tenant_filter_excludes_other_tenants() {
        let db = MemoryDatabase::open_in_memory(3).await.unwrap();
        let mut a = point(vec![1.0, 0.0, 0.0], json!({"query": "a"}));
        a.tenant_id = Some("tenant-a".into());
        db.upsert(a).await.unwrap();

        let hits = db
            .search_similar(vec![1.0, 0.0, 0.0], 5, Some("tenant-b".into()))
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn delete_removes_point_and_vector() {
        let db = MemoryDatabase::open_in_memory(3).await.unwrap();
        let a = point(vec![1.0, 0.0, 0.0], json!({"query": "a"}));
        db.upsert(a.clone()).await.unwrap();
        db.delete(a.id).await.unwrap();

        let hits = db.search_similar(vec![1.0, 0.0, 0.0], 5, None).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn session_points_orders_most_recent_first() {
        let db = MemoryDatabase::open_in_memory(3).await.unwrap();
        let session_id = Uuid::new_v4();
        let mut first = point(vec![1.0, 0.0, 0.0], json!({"n": 1}));
        first.session_id = Some(session_id);
        let mut second = point(vec![0.0, 1.0, 0.0], json!({"n": 2}));
        second.session_id = Some(session_id);
        second.timestamp = first.timestamp + chrono::Duration::seconds(5);

        db.upsert(first).await.unwrap();
        db.upsert(second).await.unwrap();

        let hits = db.session_points(session_id, None, 10).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0["n"], 2);
    }
}
