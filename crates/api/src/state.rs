use std::sync::Arc;

use sessionlock_core::registry::SessionRegistry;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Session registry over the configured store.
    pub registry: SessionRegistry,
    /// Database pool, present only when the registry is backed by PostgreSQL.
    pub pool: Option<sessionlock_db::DbPool>,
    /// Server configuration (JWT settings, account directory, ...).
    pub config: Arc<ServerConfig>,
}
