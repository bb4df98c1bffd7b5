//! Session registry: register, validate, and logout over a [`SessionStore`].
//!
//! The registry holds no state of its own beyond the store and the TTL
//! policy, so it is cheap to clone into request handlers.

use std::sync::Arc;

use chrono::Utc;

use crate::error::CoreError;
use crate::session::{check_record, ttl_from_days, InvalidReason, SessionRecord, Validation};
use crate::store::SessionStore;
use crate::types::{Timestamp, UserKey};

/// TTL applied when a register request does not carry `expiryDays`.
pub const DEFAULT_TTL_DAYS: f64 = 1.0;

/// Upper bound on the TTL a client may request.
pub const MAX_TTL_DAYS: f64 = 30.0;

/// How register requests are turned into expiry times.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TtlPolicy {
    pub default_days: f64,
    pub max_days: f64,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            default_days: DEFAULT_TTL_DAYS,
            max_days: MAX_TTL_DAYS,
        }
    }
}

/// Input to [`SessionRegistry::register`].
#[derive(Debug, Clone)]
pub struct Registration {
    pub user_key: String,
    pub token: String,
    pub device_label: String,
    pub ttl_days: Option<f64>,
}

#[derive(Clone)]
pub struct SessionRegistry {
    store: Arc<dyn SessionStore>,
    policy: TtlPolicy,
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn SessionStore>, policy: TtlPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> TtlPolicy {
        self.policy
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    /// Store `token` as the owner of the user's session, replacing any
    /// previous owner.
    pub async fn register(&self, input: Registration) -> Result<SessionRecord, CoreError> {
        self.register_at(input, Utc::now()).await
    }

    pub async fn register_at(
        &self,
        input: Registration,
        now: Timestamp,
    ) -> Result<SessionRecord, CoreError> {
        let user_key = UserKey::parse(&input.user_key)?;
        let token = require_token(&input.token)?;
        let days = input.ttl_days.unwrap_or(self.policy.default_days);
        let ttl = ttl_from_days(days, self.policy.max_days)?;

        let record = SessionRecord::new(
            user_key,
            token.to_string(),
            input.device_label.trim().to_string(),
            now,
            ttl,
        );

        self.store.put(record.clone()).await?;

        tracing::info!(
            user_key = %record.user_key,
            device = %record.device_label,
            expires_at = %record.expires_at,
            "Session registered",
        );

        Ok(record)
    }

    /// Check whether `token` still owns the user's session.
    ///
    /// Never fails on input: a blank key or token cannot own a record, so it
    /// reports [`InvalidReason::SessionEnded`].
    pub async fn validate(&self, user_key: &str, token: &str) -> Result<Validation, CoreError> {
        self.validate_at(user_key, token, Utc::now()).await
    }

    pub async fn validate_at(
        &self,
        user_key: &str,
        token: &str,
        now: Timestamp,
    ) -> Result<Validation, CoreError> {
        let Ok(user_key) = UserKey::parse(user_key) else {
            tracing::debug!("Validate with blank user key");
            return Ok(Validation::Invalid(InvalidReason::SessionEnded));
        };
        if token.is_empty() {
            tracing::debug!(user_key = %user_key, "Validate with blank token");
            return Ok(Validation::Invalid(InvalidReason::SessionEnded));
        }
        let record = self.store.get(&user_key).await?;
        let validation = check_record(record.as_ref(), token, now);

        if let Validation::Invalid(reason) = validation {
            tracing::debug!(user_key = %user_key, %reason, "Session check failed");
        }

        Ok(validation)
    }

    /// Delete the user's session record if one exists.
    ///
    /// The token is not compared against the owner: any holder of the key
    /// may end the session. Returns `true` if a record was removed.
    pub async fn logout(&self, user_key: &str, _token: &str) -> Result<bool, CoreError> {
        let user_key = match UserKey::parse(user_key) {
            Ok(key) => key,
            Err(_) => {
                tracing::debug!("Logout with empty user key ignored");
                return Ok(false);
            }
        };

        let removed = self.store.remove(&user_key).await?;
        if removed {
            tracing::info!(user_key = %user_key, "Session ended");
        }
        Ok(removed)
    }

    /// Drop every record that has already expired.
    pub async fn purge_expired(&self) -> Result<u64, CoreError> {
        self.purge_expired_at(Utc::now()).await
    }

    pub async fn purge_expired_at(&self, now: Timestamp) -> Result<u64, CoreError> {
        Ok(self.store.purge_expired(now).await?)
    }
}

fn require_token(token: &str) -> Result<&str, CoreError> {
    if token.is_empty() {
        return Err(CoreError::Validation("token must not be empty".into()));
    }
    Ok(token)
}
