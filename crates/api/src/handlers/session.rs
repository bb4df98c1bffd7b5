//! Handlers for the `/session` resource (register, validate, logout).
//!
//! These endpoints are unauthenticated: possession of the owner token is the
//! only proof of ownership the registry knows about.

use axum::extract::State;
use axum::Json;
use sessionlock_core::registry::Registration;
use sessionlock_core::wire::{Ack, LogoutRequest, RegisterRequest, ValidateRequest, ValidateResponse};

use crate::error::AppResult;
use crate::state::AppState;

/// POST /session/register
///
/// Make `token` the owner of the user's session, displacing any previous
/// owner immediately.
pub async fn register(
    State(state): State<AppState>,
    Json(input): Json<RegisterRequest>,
) -> AppResult<Json<Ack>> {
    state
        .registry
        .register(Registration {
            user_key: input.user_key,
            token: input.token,
            device_label: input.device,
            ttl_days: input.expiry_days,
        })
        .await?;

    Ok(Json(Ack {}))
}

/// POST /session/validate
///
/// Report whether `token` still owns the user's session.
pub async fn validate(
    State(state): State<AppState>,
    Json(input): Json<ValidateRequest>,
) -> AppResult<Json<ValidateResponse>> {
    let validation = state
        .registry
        .validate(&input.user_key, &input.token)
        .await?;

    Ok(Json(validation.into()))
}

/// POST /session/logout
///
/// Delete the user's session record. Succeeds whether or not one existed.
pub async fn logout(
    State(state): State<AppState>,
    Json(input): Json<LogoutRequest>,
) -> AppResult<Json<Ack>> {
    state.registry.logout(&input.user_key, &input.token).await?;
    Ok(Json(Ack {}))
}
