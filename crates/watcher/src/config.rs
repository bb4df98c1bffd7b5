//! Watcher configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Poll cadence.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(20);

/// Client-side bound on each registry and login call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// TTL requested when registering a session.
pub const DEFAULT_TTL_DAYS: f64 = 1.0;

/// Behaviour of a [`SessionContext`](crate::context::SessionContext).
#[derive(Debug, Clone)]
pub struct WatcherSettings {
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    /// Sent as `expiryDays` on register.
    pub ttl_days: f64,
    /// Sent as `device` on register.
    pub device_label: String,
}

impl Default for WatcherSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            ttl_days: DEFAULT_TTL_DAYS,
            device_label: default_device_label(),
        }
    }
}

/// `"<os> <arch>"` of the running binary, e.g. `"macos aarch64"`.
pub fn default_device_label() -> String {
    format!("{} {}", std::env::consts::OS, std::env::consts::ARCH)
}

/// Email and password used when no stored session can be restored.
#[derive(Clone)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Configuration for the watcher binary.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Base URL of the session registry.
    pub registry_url: String,
    /// Base URL of the API serving `/api/login`.
    pub api_url: String,
    pub credentials_path: PathBuf,
    pub settings: WatcherSettings,
    pub login: Option<LoginCredentials>,
}

impl WatcherConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                          |
    /// |-------------------------|----------------------------------|
    /// | `REGISTRY_URL`          | `http://localhost:3000`          |
    /// | `API_URL`               | value of `REGISTRY_URL`          |
    /// | `CREDENTIALS_PATH`      | `.sessionlock/credentials.json`  |
    /// | `POLL_INTERVAL_SECS`    | `20`                             |
    /// | `REGISTRY_TIMEOUT_SECS` | `20`                             |
    /// | `SESSION_TTL_DAYS`      | `1`                              |
    /// | `DEVICE_LABEL`          | `<os> <arch>`                    |
    /// | `LOGIN_EMAIL`           | --                               |
    /// | `LOGIN_PASSWORD`        | --                               |
    ///
    /// Returns an error message naming the first invalid variable.
    pub fn from_env() -> Result<Self, String> {
        let registry_url =
            std::env::var("REGISTRY_URL").unwrap_or_else(|_| "http://localhost:3000".into());
        let api_url = std::env::var("API_URL").unwrap_or_else(|_| registry_url.clone());

        let credentials_path = std::env::var("CREDENTIALS_PATH")
            .unwrap_or_else(|_| ".sessionlock/credentials.json".into())
            .into();

        let poll_interval_secs: u64 = parse_var("POLL_INTERVAL_SECS", 20)?;
        let request_timeout_secs: u64 = parse_var("REGISTRY_TIMEOUT_SECS", 20)?;
        let ttl_days: f64 = parse_var("SESSION_TTL_DAYS", DEFAULT_TTL_DAYS)?;
        if !ttl_days.is_finite() {
            return Err("SESSION_TTL_DAYS must be finite".into());
        }

        let device_label = std::env::var("DEVICE_LABEL").unwrap_or_else(|_| default_device_label());

        let login = match (std::env::var("LOGIN_EMAIL"), std::env::var("LOGIN_PASSWORD")) {
            (Ok(email), Ok(password)) => Some(LoginCredentials { email, password }),
            _ => None,
        };

        Ok(Self {
            registry_url,
            api_url,
            credentials_path,
            settings: WatcherSettings {
                poll_interval: Duration::from_secs(poll_interval_secs.max(1)),
                request_timeout: Duration::from_secs(request_timeout_secs.max(1)),
                ttl_days,
                device_label,
            },
            login,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, String> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| format!("{name} has an invalid value: {raw:?}")),
        Err(_) => Ok(default),
    }
}
