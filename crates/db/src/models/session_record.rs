//! Session record row from the `session_records` table.

use sessionlock_core::error::CoreError;
use sessionlock_core::session::SessionRecord;
use sessionlock_core::types::{Timestamp, UserKey};
use sqlx::FromRow;

/// A row from the `session_records` table.
#[derive(Debug, Clone, FromRow)]
pub struct SessionRecordRow {
    pub user_key: String,
    pub owner_token: String,
    pub device_label: String,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
}

impl TryFrom<SessionRecordRow> for SessionRecord {
    type Error = CoreError;

    fn try_from(row: SessionRecordRow) -> Result<Self, Self::Error> {
        Ok(SessionRecord {
            user_key: UserKey::parse(&row.user_key)?,
            owner_token: row.owner_token,
            device_label: row.device_label,
            created_at: row.created_at,
            expires_at: row.expires_at,
        })
    }
}
