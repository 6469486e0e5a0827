//! Adapts `SessionStore` to `shannon_harness::ports::SessionStorePort` so
//! the workflow engine depends only on the port trait, never on this
//! crate's SQLite specifics (spec §9 "dynamic dispatch over dependencies
//! ... replaced by a small set of named ports").

use async_trait::async_trait;
use uuid::Uuid;

use shannon_core::error::ShannonResult;
use shannon_core::model::{SessionContext, TaskSummary};
use shannon_harness::ports::SessionStorePort;

use crate::db::SessionStore;

pub struct SqliteSessionStore {
    inner: SessionStore,
}

impl SqliteSessionStore {
    pub fn new(inner: SessionStore) -> Self {
        Self { inner }
    }

    pub async fn list_sessions(
        &self,
        user_id: String,
        limit: u32,
        offset: u32,
    ) -> ShannonResult<(Vec<SessionContext>, u64)> {
        self.inner.list_sessions(user_id, limit, offset).await
    }
}

#[async_trait]
impl SessionStorePort for SqliteSessionStore {
    async fn get(&self, session_id: Uuid) -> ShannonResult<Option<SessionContext>> {
        self.inner.get(session_id).await
    }

    async fn get_or_create(
        &self,
        session_id: Uuid,
        user_id: String,
    ) -> ShannonResult<SessionContext> {
        self.inner.create(session_id, user_id).await
    }

    async fn append_task(&self, session_id: Uuid, task: TaskSummary) -> ShannonResult<()> {
        self.inner.append_task(session_id, task).await
    }

    async fn update_context(
        &self,
        session_id: Uuid,
        patch: std::collections::HashMap<String, serde_json::Value>,
    ) -> ShannonResult<()> {
        self.inner.update_context(session_id, patch).await
    }

    async fn delete(&self, session_id: Uuid) -> ShannonResult<()> {
        self.inner.delete(session_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SessionStoreConfig;

    #[tokio::test]
    async fn port_roundtrips_through_adapter() {
        let store = SqliteSessionStore::new(
            SessionStore::open_in_memory(SessionStoreConfig::default())
                .await
                .unwrap(),
        );
        let id = Uuid::new_v4();
        store.get_or_create(id, "user-1".into()).await.unwrap();

        let port: &dyn SessionStorePort = &store;
        assert!(port.get(id).await.unwrap().is_some());
        port.delete(id).await.unwrap();
        assert!(port.get(id).await.unwrap().is_none());
    }
}
