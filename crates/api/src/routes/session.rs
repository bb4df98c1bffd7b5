//! Route definitions for the `/session` resource.

use axum::routing::post;
use axum::Router;

use crate::handlers::session;
use crate::state::AppState;

/// Routes mounted at `/session`.
///
/// ```text
/// POST /register  -> register
/// POST /validate  -> validate
/// POST /logout    -> logout
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(session::register))
        .route("/validate", post(session::validate))
        .route("/logout", post(session::logout))
}
