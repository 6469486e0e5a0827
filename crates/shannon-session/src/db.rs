//! SQLite-backed `SessionContext` storage (spec §4.5, C5).

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use shannon_core::error::{ShannonError, ShannonResult};
use shannon_core::model::{SessionContext, TaskSummary, TokenUsage};

/// Tunables for the session store.
#[derive(Debug, Clone, Copy)]
pub struct SessionStoreConfig {
    /// Bound on `SessionContext::recent_tasks` (spec §3 "bounded, sliding").
    /// Oldest entries are dropped once this is exceeded.
    pub max_recent_tasks: usize,
}

impl Default for SessionStoreConfig {
    fn default() -> Self {
        Self {
            max_recent_tasks: 20,
        }
    }
}

/// Async SQLite-backed store for `SessionContext`.
///
/// All operations go through a single `tokio_rusqlite::Connection`, whose
/// internal actor thread processes calls one at a time — this is what
/// gives us "concurrent writers for the same session are serialized"
/// (spec §4.5) for free, without a separate per-session lock table.
pub struct SessionStore {
    conn: tokio_rusqlite::Connection,
    config: SessionStoreConfig,
}

impl SessionStore {
    pub async fn open(path: impl AsRef<Path>, config: SessionStoreConfig) -> ShannonResult<Self> {
        let conn = tokio_rusqlite::Connection::open(path.as_ref())
            .await
            .map_err(|e| ShannonError::Internal(format!("opening session store: {e}")))?;
        let store = Self { conn, config };
        store.init_schema().await?;
        Ok(store)
    }

    pub async fn open_in_memory(config: SessionStoreConfig) -> ShannonResult<Self> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(|e| ShannonError::Internal(format!("opening in-memory session store: {e}")))?;
        let store = Self { conn, config };
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
                    PRAGMA busy_timeout=5000;

                    CREATE TABLE IF NOT EXISTS sessions (
                        session_id   TEXT PRIMARY KEY,
                        user_id      TEXT NOT NULL,
                        context_json TEXT NOT NULL DEFAULT '{}',
                        token_usage_json TEXT NOT NULL DEFAULT '{}',
                        created_at   TEXT NOT NULL,
                        updated_at   TEXT NOT NULL
                    );

                    CREATE INDEX IF NOT EXISTS idx_sessions_user
                        ON sessions(user_id, updated_at);

                    CREATE TABLE IF NOT EXISTS recent_tasks (
                        session_id TEXT NOT NULL,
                        seq        INTEGER NOT NULL,
                        task_json  TEXT NOT NULL,
                        PRIMARY KEY (session_id, seq)
                    );
                    ",
                )?;
                Ok(())
            })
            .await
            .map_err(|e| ShannonError::Internal(format!("initializing session store schema: {e}")))
    }

    /// Create a new empty session. Returns the existing session unchanged
    /// if `session_id` is already present (idempotent under retry).
    pub async fn create(&self, session_id: Uuid, user_id: String) -> ShannonResult<SessionContext> {
        if let Some(existing) = self.get(session_id).await? {
            return Ok(existing);
        }
        let ctx = SessionContext::new(session_id, user_id);
        let row = ctx.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO sessions
                        (session_id, user_id, context_json, token_usage_json, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT(session_id) DO NOTHING",
                    params![
                        row.session_id.to_string(),
                        row.user_id,
                        serde_json::to_string(&row.context).unwrap_or_default(),
                        serde_json::to_string(&row.token_usage).unwrap_or_default(),
                        row.created_at.to_rfc3339(),
                        row.updated_at.to_rfc3339(),
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(|e| ShannonError::Internal(format!("creating session: {e}")))?;
        Ok(ctx)
    }

    pub async fn get(&self, session_id: Uuid) -> ShannonResult<Option<SessionContext>> {
        let id = session_id.to_string();
        let row = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT session_id, user_id, context_json, token_usage_json,
                            created_at, updated_at FROM sessions WHERE session_id = ?1",
                )?;
                let row = stmt.query_row(params![id], row_to_session).ok();
                Ok::<_, rusqlite::Error>(row)
            })
            .await
            .map_err(|e| ShannonError::Internal(format!("reading session: {e}")))?;

        let Some(mut ctx) = row else { return Ok(None) };
        ctx.recent_tasks = self.load_recent_tasks(session_id).await?;
        Ok(Some(ctx))
    }

    async fn load_recent_tasks(&self, session_id: Uuid) -> ShannonResult<Vec<TaskSummary>> {
        let id = session_id.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT task_json FROM recent_tasks WHERE session_id = ?1 ORDER BY seq ASC",
                )?;
                let rows = stmt
                    .query_map(params![id], |row| row.get::<_, String>(0))?
                    .filter_map(|r| r.ok())
                    .filter_map(|s| serde_json::from_str::<TaskSummary>(&s).ok())
                    .collect();
                Ok(rows)
            })
            .await
            .map_err(|e| ShannonError::Internal(format!("reading recent tasks: {e}")))
    }

    /// Append a `TaskSummary`, merge its tokens/cost into the running
    /// total, and trim `recent_tasks` to `max_recent_tasks` (spec §4.5).
    pub async fn append_task(&self, session_id: Uuid, task: TaskSummary) -> ShannonResult<()> {
        let max_recent = self.config.max_recent_tasks as i64;
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let id = session_id.to_string();

                let (usage_json, _created_at): (String, String) = tx.query_row(
                    "SELECT token_usage_json, created_at FROM sessions WHERE session_id = ?1",
                    params![id],
                    |r| Ok((r.get(0)?, r.get(1)?)),
                )?;
                let mut usage: TokenUsage =
                    serde_json::from_str(&usage_json).unwrap_or_default();
                usage.merge(&TokenUsage {
                    prompt_tokens: 0,
                    completion_tokens: 0,
                    total_tokens: task.tokens_used,
                    cost_usd: task.cost_usd,
                    model: usage.model.clone(),
                    tier: usage.tier.clone(),
                });

                let next_seq: i64 = tx.query_row(
                    "SELECT COALESCE(MAX(seq), 0) + 1 FROM recent_tasks WHERE session_id = ?1",
                    params![id],
                    |r| r.get(0),
                )?;
                tx.execute(
                    "INSERT INTO recent_tasks (session_id, seq, task_json) VALUES (?1, ?2, ?3)",
                    params![id, next_seq, serde_json::to_string(&task).unwrap_or_default()],
                )?;
                tx.execute(
                    "DELETE FROM recent_tasks WHERE session_id = ?1 AND seq <= (
                        SELECT MAX(seq) - ?2 FROM recent_tasks WHERE session_id = ?1
                    )",
                    params![id, max_recent],
                )?;
                tx.execute(
                    "UPDATE sessions SET token_usage_json = ?2, updated_at = ?3 WHERE session_id = ?1",
                    params![id, serde_json::to_string(&usage).unwrap_or_default(), Utc::now().to_rfc3339()],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(|e| ShannonError::Internal(format!("appending task summary: {e}")))
    }

    /// Shallow-merge `patch` into the session context, last-writer-wins
    /// per key (spec §4.5).
    pub async fn update_context(
        &self,
        session_id: Uuid,
        patch: HashMap<String, serde_json::Value>,
    ) -> ShannonResult<()> {
        self.conn
            .call(move |conn| {
                let id = session_id.to_string();
                let current_json: String = conn.query_row(
                    "SELECT context_json FROM sessions WHERE session_id = ?1",
                    params![id],
                    |r| r.get(0),
                )?;
                let mut current: HashMap<String, serde_json::Value> =
                    serde_json::from_str(&current_json).unwrap_or_default();
                current.extend(patch);
                conn.execute(
                    "UPDATE sessions SET context_json = ?2, updated_at = ?3 WHERE session_id = ?1",
                    params![
                        id,
                        serde_json::to_string(&current).unwrap_or_default(),
                        Utc::now().to_rfc3339()
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(|e| ShannonError::Internal(format!("updating session context: {e}")))
    }

    pub async fn delete(&self, session_id: Uuid) -> ShannonResult<()> {
        self.conn
            .call(move |conn| {
                let id = session_id.to_string();
                conn.execute("DELETE FROM recent_tasks WHERE session_id = ?1", params![id])?;
                conn.execute("DELETE FROM sessions WHERE session_id = ?1", params![id])?;
                Ok(())
            })
            .await
            .map_err(|e| ShannonError::Internal(format!("deleting session: {e}")))
    }

    /// Paginated listing for a user, newest-first by `updated_at` (spec
    /// §4.5 `list_sessions`).
    pub async fn list_sessions(
        &self,
        user_id: String,
        limit: u32,
        offset: u32,
    ) -> ShannonResult<(Vec<SessionContext>, u64)> {
        let rows = self
            .conn
            .call({
                let user_id = user_id.clone();
                move |conn| {
                    let total: i64 = conn.query_row(
                        "SELECT COUNT(*) FROM sessions WHERE user_id = ?1",
                        params![user_id],
                        |r| r.get(0),
                    )?;
                    let mut stmt = conn.prepare(
                        "SELECT session_id, user_id, context_json, token_usage_json,
                                created_at, updated_at FROM sessions
                         WHERE user_id = ?1 ORDER BY updated_at DESC LIMIT ?2 OFFSET ?3",
                    )?;
                    let sessions = stmt
                        .query_map(params![user_id, limit, offset], row_to_session)?
                        .filter_map(|r| r.ok())
                        .collect::<Vec<_>>();
                    Ok((sessions, total as u64))
                }
            })
            .await
            .map_err(|e| ShannonError::Internal(format!("listing sessions: {e}")))?;

        let (mut sessions, total) = rows;
        for ctx in sessions.iter_mut() {
            ctx.recent_tasks = self.load_recent_tasks(ctx.session_id).await?;
        }
        Ok((sessions, total))
    }
}

fn row_to_session(row: &rusqlite::Row) -> rusqlite::Result<SessionContext> {
    let session_id: String = row.get(0)?;
    let context_json: String = row.get(2)?;
    let token_usage_json: String = row.get(3)?;
    let created_at: String = row.get(4)?;
    let updated_at: String = row.get(5)?;

    Ok(SessionContext {
        session_id: Uuid::parse_str(&session_id).unwrap_or_default(),
        user_id: row.get(1)?,
        context: serde_json::from_str(&context_json).unwrap_or_default(),
        recent_tasks: Vec::new(),
        token_usage: serde_json::from_str(&token_usage_json).unwrap_or_default(),
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        updated_at: DateTime::parse_from_rfc3339(&updated_at)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}
