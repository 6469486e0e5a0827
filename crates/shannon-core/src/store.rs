//! Durable task-record persistence (spec §6 "Persisted state").
//!
//! Adapted from an agent cache schema: same WAL pragma tuning, same
//! async-connection-actor shape, generalized from agent cache entries to
//! task records. Every blocking `rusqlite` call runs inside
//! `tokio_rusqlite::Connection`'s internal actor thread, never on the
//! async executor (spec §5 "dedicated blocking pool").

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ShannonError, ShannonResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
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

impl TaskStatus {
    fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Routing => "routing",
            TaskStatus::Planning => "planning",
            TaskStatus::Scheduling => "scheduling",
            TaskStatus::Dispatching => "dispatching",
            TaskStatus::Aggregating => "aggregating",
            TaskStatus::Finalizing => "finalizing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    fn from_str(s: &str) -> ShannonResult<Self> {
        Ok(match s {
            "routing" => TaskStatus::Routing,
            "planning" => TaskStatus::Planning,
            "scheduling" => TaskStatus::Scheduling,
            "dispatching" => TaskStatus::Dispatching,
            "aggregating" => TaskStatus::Aggregating,
            "finalizing" => TaskStatus::Finalizing,
            "completed" => TaskStatus::Completed,
            "failed" => TaskStatus::Failed,
            "cancelled" => TaskStatus::Cancelled,
            other => {
                return Err(ShannonError::Internal(format!(
                    "unknown task status in store: {other}"
                )))
            }
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: Uuid,
    pub user_id: String,
    pub session_id: Uuid,
    pub query: String,
    pub status: TaskStatus,
    pub mode: Option<String>,
    pub model_used: Option<String>,
    pub provider: Option<String>,
    pub tokens: u64,
    pub cost_usd: f64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

/// Async SQLite-backed store for task records.
pub struct TaskStore {
    conn: tokio_rusqlite::Connection,
}

impl TaskStore {
    pub async fn open(path: impl AsRef<Path>) -> ShannonResult<Self> {
        let conn = tokio_rusqlite::Connection::open(path.as_ref())
            .await
            .map_err(|e| ShannonError::Internal(format!("opening task store: {e}")))?;
        let store = Self { conn };
        store.init_schema().await?;
        Ok(store)
    }

    pub async fn open_in_memory() -> ShannonResult<Self> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(|e| ShannonError::Internal(format!("opening in-memory task store: {e}")))?;
        let store = Self { conn };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> ShannonResult<()> {
        self.conn
            .call(|conn| {
                conn.execute_batch(
                    "
                    PRAGMA journal_mode=WAL;
                    PRAGMA synchronous=NORMAL;
                    PRAGMA cache_size=-64000;
                    PRAGMA mmap_size=268435456;
                    PRAGMA temp_store=MEMORY;
                    PRAGMA busy_timeout=5000;

                    CREATE TABLE IF NOT EXISTS task_records (
                        task_id      TEXT PRIMARY KEY,
                        user_id      TEXT NOT NULL,
                        session_id   TEXT NOT NULL,
                        query        TEXT NOT NULL,
                        status       TEXT NOT NULL,
                        mode         TEXT,
                        model_used   TEXT,
                        provider     TEXT,
                        tokens       INTEGER NOT NULL DEFAULT 0,
                        cost_usd     REAL NOT NULL DEFAULT 0.0,
                        started_at   TEXT NOT NULL,
                        completed_at TEXT,
                        error        TEXT
                    );

                    CREATE INDEX IF NOT EXISTS idx_task_records_session
                        ON task_records(session_id);
                    CREATE INDEX IF NOT EXISTS idx_task_records_status
                        ON task_records(status);
                    ",
                )?;
                Ok(())
            })
            .await
            .map_err(|e| ShannonError::Internal(format!("initializing task store schema: {e}")))
    }

    pub async fn upsert(&self, record: TaskRecord) -> ShannonResult<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO task_records
                        (task_id, user_id, session_id, query, status, mode, model_used,
                         provider, tokens, cost_usd, started_at, completed_at, error)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                     ON CONFLICT(task_id) DO UPDATE SET
                        status = excluded.status,
                        mode = excluded.mode,
                        model_used = excluded.model_used,
                        provider = excluded.provider,
                        tokens = excluded.tokens,
                        cost_usd = excluded.cost_usd,
                        completed_at = excluded.completed_at,
                        error = excluded.error",
                    rusqlite::params![
                        record.task_id.to_string(),
                        record.user_id,
                        record.session_id.to_string(),
                        record.query,
                        record.status.as_str(),
                        record.mode,
                        record.model_used,
                        record.provider,
                        record.tokens,
                        record.cost_usd,
                        record.started_at.to_rfc3339(),
                        record.completed_at.map(|t| t.to_rfc3339()),
                        record.error,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(|e| ShannonError::Internal(format!("upserting task record: {e}")))
    }

    pub async fn get(&self, task_id: Uuid) -> ShannonResult<Option<TaskRecord>> {
        let id = task_id.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT task_id, user_id, session_id, query, status, mode, model_used,
                            provider, tokens, cost_usd, started_at, completed_at, error
                     FROM task_records WHERE task_id = ?1",
                )?;
                let row = stmt
                    .query_row(rusqlite::params![id], row_to_record)
                    .ok();
                Ok(row)
            })
            .await
            .map_err(|e| ShannonError::Internal(format!("reading task record: {e}")))
    }
}

fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<TaskRecord> {
    let task_id: String = row.get(0)?;
    let session_id: String = row.get(2)?;
    let status: String = row.get(4)?;
    let started_at: String = row.get(10)?;
    let completed_at: Option<String> = row.get(11)?;

    Ok(TaskRecord {
        task_id: Uuid::parse_str(&task_id).unwrap_or_default(),
        user_id: row.get(1)?,
        session_id: Uuid::parse_str(&session_id).unwrap_or_default(),
        query: row.get(3)?,
        status: TaskStatus::from_str(&status).unwrap_or(TaskStatus::Failed),
        mode: row.get(5)?,
        model_used: row.get(6)?,
        provider: row.get(7)?,
        tokens: row.get(8)?,
        cost_usd: row.get(9)?,
        started_at: DateTime::parse_from_rfc3339(&started_at)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        completed_at: completed_at
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|d| d.with_timezone(&Utc)),
        error: row.get(12)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_then_get_roundtrips() {
        let store = TaskStore::open_in_memory().await.unwrap();
        let task_id = Uuid::new_v4();
        let record = TaskRecord {
            task_id,
            user_id: "user-1".into(),
            session_id: Uuid::new_v4(),
            query: "what is 2+2".into(),
            status: TaskStatus::Completed,
            mode: Some("simple".into()),
            model_used: Some("claude-haiku".into()),
            provider: Some("anthropic".into()),
            tokens: 42,
            cost_usd: 0.001,
            started_at: Utc::now(),
            completed_at: Some(Utc::now()),
            error: None,
        };
        store.upsert(record.clone()).await.unwrap();

        let fetched = store.get(task_id).await.unwrap().unwrap();
        assert_eq!(fetched.task_id, task_id);
        assert_eq!(fetched.tokens, 42);
        assert_eq!(fetched.status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn get_missing_returns_none() {
        let store = TaskStore::open_in_memory().await.unwrap();
        assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_twice_updates_in_place() {
        let store = TaskStore::open_in_memory().await.unwrap();
        let task_id = Uuid::new_v4();
        let mut record = TaskRecord {
            task_id,
            user_id: "user-1".into(),
            session_id: Uuid::new_v4(),
            query: "q".into(),
            status: TaskStatus::Routing,
            mode: None,
            model_used: None,
            provider: None,
            tokens: 0,
            cost_usd: 0.0,
            started_at: Utc::now(),
            completed_at: None,
            error: None,
        };
        store.upsert(record.clone()).await.unwrap();

        record.status = TaskStatus::Completed;
        record.tokens = 100;
        store.upsert(record).await.unwrap();

        let fetched = store.get(task_id).await.unwrap().unwrap();
        assert_eq!(fetched.status, TaskStatus::Completed);
        assert_eq!(fetched.tokens, 100);
    }
}
