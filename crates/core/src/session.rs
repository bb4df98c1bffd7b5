//! Session records and the validation rule that decides ownership.
//!
//! This module is pure: every time-dependent function takes `now` as an
//! argument so the registry, the store implementations, and tests all agree
//! on a single clock reading per operation.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{Timestamp, UserKey};

/// Seconds in one TTL day.
const SECS_PER_DAY: f64 = 86_400.0;

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// The single record stating which token currently owns a user's session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub user_key: UserKey,
    /// Opaque token generated by the client at login time.
    pub owner_token: String,
    /// Free-text description of the owning client. Informational only.
    pub device_label: String,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
}

impl SessionRecord {
    /// Build a record created at `now` that expires after `ttl`.
    ///
    /// A zero or negative `ttl` yields a record that is already expired.
    pub fn new(
        user_key: UserKey,
        owner_token: String,
        device_label: String,
        now: Timestamp,
        ttl: Duration,
    ) -> Self {
        let expires_at = now
            .checked_add_signed(ttl)
            .unwrap_or(if ttl > Duration::zero() {
                Timestamp::MAX_UTC
            } else {
                Timestamp::MIN_UTC
            });

        Self {
            user_key,
            owner_token,
            device_label,
            created_at: now,
            expires_at,
        }
    }

    /// A record is live only while `now < expires_at`.
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }

    /// Decide whether `token` owns this record at `now`.
    ///
    /// Expiry is checked before the token comparison, so an expired record
    /// reports [`InvalidReason::SessionExpired`] even for a stale token.
    pub fn check(&self, token: &str, now: Timestamp) -> Validation {
        if self.is_expired_at(now) {
            Validation::Invalid(InvalidReason::SessionExpired)
        } else if self.owner_token != token {
            Validation::Invalid(InvalidReason::SessionDisplaced)
        } else {
            Validation::Valid
        }
    }
}

// ---------------------------------------------------------------------------
// Validation result
// ---------------------------------------------------------------------------

/// Why a presented token no longer owns the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidReason {
    /// The record is live but another login replaced the token.
    SessionDisplaced,
    /// The record's TTL elapsed.
    SessionExpired,
    /// No record exists (logged out, purged, or never registered).
    SessionEnded,
}

impl InvalidReason {
    /// Wire representation used in the `reason` field.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SessionDisplaced => "session_displaced",
            Self::SessionExpired => "session_expired",
            Self::SessionEnded => "session_ended",
        }
    }

    /// Parse a wire reason. Unknown values return `None`.
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "session_displaced" => Some(Self::SessionDisplaced),
            "session_expired" => Some(Self::SessionExpired),
            "session_ended" => Some(Self::SessionEnded),
            _ => None,
        }
    }
}

impl std::fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of checking a token against the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    Valid,
    Invalid(InvalidReason),
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// Validate `token` against an optional record. A missing record means the
/// session has ended.
pub fn check_record(record: Option<&SessionRecord>, token: &str, now: Timestamp) -> Validation {
    match record {
        Some(record) => record.check(token, now),
        None => Validation::Invalid(InvalidReason::SessionEnded),
    }
}

// ---------------------------------------------------------------------------
// TTL
// ---------------------------------------------------------------------------

/// Convert a TTL expressed in (possibly fractional) days into a duration.
///
/// The value is clamped to `[-max_days, max_days]`. Non-finite input is a
/// validation error.
pub fn ttl_from_days(days: f64, max_days: f64) -> Result<Duration, CoreError> {
    if !days.is_finite() {
        return Err(CoreError::Validation(
            "expiryDays must be a finite number".into(),
        ));
    }
    let max_days = max_days.abs();
    let clamped = days.clamp(-max_days, max_days);
    let secs = (clamped * SECS_PER_DAY).round() as i64;
    Ok(Duration::seconds(secs))
}
