//! JSON bodies exchanged on the `/session/*` endpoints.
//!
//! Shared by the API (which deserializes requests) and the watcher (which
//! serializes them) so both sides agree on field names.

use serde::{Deserialize, Serialize};

use crate::session::{InvalidReason, Validation};

/// Body of `POST /session/register`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub user_key: String,
    pub token: String,
    #[serde(default)]
    pub device: String,
    /// TTL in days. Falls back to the server default when absent.
    #[serde(rename = "expiryDays", default, skip_serializing_if = "Option::is_none")]
    pub expiry_days: Option<f64>,
}

/// Body of `POST /session/validate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateRequest {
    pub user_key: String,
    pub token: String,
}

/// Body of `POST /session/logout`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogoutRequest {
    pub user_key: String,
    pub token: String,
}

/// Response of `POST /session/validate`.
///
/// `reason` is present only when `valid` is `false`. It is kept as a raw
/// string so clients tolerate reasons they do not know yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateResponse {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ValidateResponse {
    pub fn valid() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    pub fn invalid(reason: InvalidReason) -> Self {
        Self {
            valid: false,
            reason: Some(reason.as_str().to_string()),
        }
    }
}

impl From<Validation> for ValidateResponse {
    fn from(validation: Validation) -> Self {
        match validation {
            Validation::Valid => Self::valid(),
            Validation::Invalid(reason) => Self::invalid(reason),
        }
    }
}

/// Empty `{}` acknowledgement returned by register and logout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {}
