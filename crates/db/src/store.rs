//! [`SessionStore`] backed by PostgreSQL.

use async_trait::async_trait;
use sessionlock_core::session::SessionRecord;
use sessionlock_core::store::{SessionStore, StoreError};
use sessionlock_core::types::{Timestamp, UserKey};

use crate::repositories::SessionRecordRepo;
use crate::DbPool;

/// Session store persisting records in the `session_records` table.
///
/// Each operation is a single statement, so same-key writers resolve as
/// last-writer-wins at the row level.
#[derive(Debug, Clone)]
pub struct PgSessionStore {
    pool: DbPool,
}

impl PgSessionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn backend_error(err: sqlx::Error) -> StoreError {
    tracing::error!(error = %err, "Session store query failed");
    StoreError::Backend(err.to_string())
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn put(&self, record: SessionRecord) -> Result<(), StoreError> {
        SessionRecordRepo::upsert(&self.pool, &record)
            .await
            .map_err(backend_error)?;
        Ok(())
    }

    async fn get(&self, user_key: &UserKey) -> Result<Option<SessionRecord>, StoreError> {
        let row = SessionRecordRepo::find(&self.pool, user_key.as_str())
            .await
            .map_err(backend_error)?;

        row.map(SessionRecord::try_from)
            .transpose()
            .map_err(|e| StoreError::Backend(format!("Corrupt session row: {e}")))
    }

    async fn remove(&self, user_key: &UserKey) -> Result<bool, StoreError> {
        SessionRecordRepo::delete(&self.pool, user_key.as_str())
            .await
            .map_err(backend_error)
    }

    async fn purge_expired(&self, now: Timestamp) -> Result<u64, StoreError> {
        SessionRecordRepo::delete_expired(&self.pool, now)
            .await
            .map_err(backend_error)
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
