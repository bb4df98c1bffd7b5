use sessionlock_core::registry::{TtlPolicy, DEFAULT_TTL_DAYS, MAX_TTL_DAYS};

use crate::auth::directory::UserDirectory;
use crate::auth::jwt::JwtConfig;

/// Default sweep interval for expired session records (1 hour).
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3600;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Session registry storage and TTL settings.
    pub session: SessionConfig,
    /// JWT token configuration (secret, expiry).
    pub jwt: JwtConfig,
    /// Accounts allowed to log in via `POST /api/login`.
    pub users: UserDirectory,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    ///
    /// See [`SessionConfig::from_env`], [`JwtConfig::from_env`] and
    /// [`UserDirectory::from_env`] for the remaining variables.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            session: SessionConfig::from_env(),
            jwt: JwtConfig::from_env(),
            users: UserDirectory::from_env(),
        }
    }
}

/// Where session records are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Process-local map. Records do not survive a restart.
    Memory,
    /// The `session_records` table in PostgreSQL.
    Postgres,
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            other => Err(format!("unknown session store '{other}'")),
        }
    }
}

/// Session registry configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub store: StoreBackend,
    /// Required when `store` is [`StoreBackend::Postgres`].
    pub database_url: Option<String>,
    /// TTL used when a register request omits `expiryDays` (default: `1`).
    pub default_ttl_days: f64,
    /// Largest TTL a client may request (default: `30`).
    pub max_ttl_days: f64,
    /// How often expired records are purged (default: `3600`).
    pub sweep_interval_secs: u64,
}

impl SessionConfig {
    /// Load session settings from environment variables.
    ///
    /// | Env Var                       | Default   |
    /// |-------------------------------|-----------|
    /// | `SESSION_STORE`               | `memory`  |
    /// | `DATABASE_URL`                | --        |
    /// | `SESSION_DEFAULT_TTL_DAYS`    | `1`       |
    /// | `SESSION_MAX_TTL_DAYS`        | `30`      |
    /// | `SESSION_SWEEP_INTERVAL_SECS` | `3600`    |
    ///
    /// # Panics
    ///
    /// Panics on unparsable values, or if `SESSION_STORE=postgres` and
    /// `DATABASE_URL` is not set.
    pub fn from_env() -> Self {
        let store: StoreBackend = std::env::var("SESSION_STORE")
            .unwrap_or_else(|_| "memory".into())
            .parse()
            .unwrap_or_else(|e| panic!("SESSION_STORE is invalid: {e}"));

        let database_url = std::env::var("DATABASE_URL").ok();
        if store == StoreBackend::Postgres {
            assert!(
                database_url.as_deref().is_some_and(|u| !u.is_empty()),
                "DATABASE_URL must be set when SESSION_STORE=postgres"
            );
        }

        let default_ttl_days: f64 = std::env::var("SESSION_DEFAULT_TTL_DAYS")
            .unwrap_or_else(|_| DEFAULT_TTL_DAYS.to_string())
            .parse()
            .expect("SESSION_DEFAULT_TTL_DAYS must be a number");

        let max_ttl_days: f64 = std::env::var("SESSION_MAX_TTL_DAYS")
            .unwrap_or_else(|_| MAX_TTL_DAYS.to_string())
            .parse()
            .expect("SESSION_MAX_TTL_DAYS must be a number");
        assert!(
            max_ttl_days.is_finite() && max_ttl_days > 0.0,
            "SESSION_MAX_TTL_DAYS must be a positive number"
        );
        assert!(
            default_ttl_days.is_finite(),
            "SESSION_DEFAULT_TTL_DAYS must be finite"
        );

        let sweep_interval_secs: u64 = std::env::var("SESSION_SWEEP_INTERVAL_SECS")
            .unwrap_or_else(|_| DEFAULT_SWEEP_INTERVAL_SECS.to_string())
            .parse()
            .expect("SESSION_SWEEP_INTERVAL_SECS must be a valid u64");

        Self {
            store,
            database_url,
            default_ttl_days,
            max_ttl_days,
            sweep_interval_secs: sweep_interval_secs.max(1),
        }
    }

    pub fn ttl_policy(&self) -> TtlPolicy {
        TtlPolicy {
            default_days: self.default_ttl_days,
            max_days: self.max_ttl_days,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            store: StoreBackend::Memory,
            database_url: None,
            default_ttl_days: DEFAULT_TTL_DAYS,
            max_ttl_days: MAX_TTL_DAYS,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
        }
    }
}
