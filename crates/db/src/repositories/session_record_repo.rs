//! Repository for the `session_records` table.

use sessionlock_core::session::SessionRecord;
use sessionlock_core::types::Timestamp;
use sqlx::PgPool;

use crate::models::session_record::SessionRecordRow;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "user_key, owner_token, device_label, created_at, expires_at";

/// Provides keyed access to session records.
pub struct SessionRecordRepo;

impl SessionRecordRepo {
    /// Insert the record, or overwrite the existing row for the same user key.
    pub async fn upsert(
        pool: &PgPool,
        record: &SessionRecord,
    ) -> Result<SessionRecordRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO session_records (user_key, owner_token, device_label, created_at, expires_at)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (user_key) DO UPDATE SET
                owner_token = EXCLUDED.owner_token,
                device_label = EXCLUDED.device_label,
                created_at = EXCLUDED.created_at,
                expires_at = EXCLUDED.expires_at
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SessionRecordRow>(&query)
            .bind(record.user_key.as_str())
            .bind(&record.owner_token)
            .bind(&record.device_label)
            .bind(record.created_at)
            .bind(record.expires_at)
            .fetch_one(pool)
            .await
    }

    /// Find the record for a user key, expired or not.
    pub async fn find(pool: &PgPool, user_key: &str) -> Result<Option<SessionRecordRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM session_records WHERE user_key = $1");
        sqlx::query_as::<_, SessionRecordRow>(&query)
            .bind(user_key)
            .fetch_optional(pool)
            .await
    }

    /// Delete the record for a user key. Returns `true` if a row was deleted.
    pub async fn delete(pool: &PgPool, user_key: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM session_records WHERE user_key = $1")
            .bind(user_key)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete records whose expiry is at or before `now`. Returns the count.
    pub async fn delete_expired(pool: &PgPool, now: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM session_records WHERE expires_at <= $1")
            .bind(now)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
