//! Storage seam for session records.
//!
//! The registry only needs single-key atomicity: each operation is a
//! standalone overwrite, read, or delete of one record, and concurrent
//! writers for the same key resolve as last-writer-wins.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::session::SessionRecord;
use crate::types::{Timestamp, UserKey};

/// Errors raised by a [`SessionStore`] backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend failed (connection lost, query error, ...).
    #[error("{0}")]
    Backend(String),
}

/// Keyed storage holding at most one [`SessionRecord`] per user key.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert or overwrite the record for `record.user_key`.
    async fn put(&self, record: SessionRecord) -> Result<(), StoreError>;

    /// Fetch the record for `user_key`, expired or not.
    async fn get(&self, user_key: &UserKey) -> Result<Option<SessionRecord>, StoreError>;

    /// Delete the record for `user_key`. Returns `true` if one existed.
    async fn remove(&self, user_key: &UserKey) -> Result<bool, StoreError>;

    /// Delete every record with `expires_at <= now`. Returns the count.
    async fn purge_expired(&self, now: Timestamp) -> Result<u64, StoreError>;

    /// Short backend name for health reporting.
    fn backend_name(&self) -> &'static str;
}

/// Process-local store. Records are lost on restart.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    records: RwLock<HashMap<UserKey, SessionRecord>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held, expired ones included.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn put(&self, record: SessionRecord) -> Result<(), StoreError> {
        self.records
            .write()
            .await
            .insert(record.user_key.clone(), record);
        Ok(())
    }

    async fn get(&self, user_key: &UserKey) -> Result<Option<SessionRecord>, StoreError> {
        Ok(self.records.read().await.get(user_key).cloned())
    }

    async fn remove(&self, user_key: &UserKey) -> Result<bool, StoreError> {
        Ok(self.records.write().await.remove(user_key).is_some())
    }

    async fn purge_expired(&self, now: Timestamp) -> Result<u64, StoreError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| !record.is_expired_at(now));
        Ok((before - records.len()) as u64)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
