//! Handlers for login and token introspection.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use sessionlock_core::error::CoreError;

use crate::auth::jwt::generate_access_token;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /api/login`.
///
/// Fields default to empty so a missing field is reported as a 400 rather
/// than a deserialization rejection.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub id: String,
    pub email: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/login
///
/// Authenticate with email + password and return a short-lived access token.
pub async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    if input.email.trim().is_empty() || input.password.is_empty() {
        return Err(AppError::BadRequest(
            "Email and password are required".into(),
        ));
    }

    let account = state
        .config
        .users
        .authenticate(&input.email, &input.password)
        .ok_or_else(|| {
            tracing::info!("Rejected login attempt");
            AppError::Core(CoreError::Unauthorized("Invalid credentials".into()))
        })?;

    let token = generate_access_token(&account.id, account.email.as_str(), &state.config.jwt)
        .map_err(|e| AppError::InternalError(format!("Token generation failed: {e}")))?;

    tracing::info!(email = %account.email, "User logged in");

    Ok(Json(LoginResponse { token }))
}

/// GET /api/me
///
/// Return the identity carried by the presented access token.
pub async fn me(user: AuthUser) -> Json<MeResponse> {
    Json(MeResponse {
        id: user.account_id,
        email: user.email,
    })
}
