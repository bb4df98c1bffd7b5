//! Client-side persistence of session credentials.
//!
//! Three values survive a restart: the API access token, the session owner
//! token, and the user key it was registered under. Restore only proceeds
//! when all three are present.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::WatcherError;

/// Credentials as read from storage. Any field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_key: Option<String>,
}

impl StoredCredentials {
    pub fn is_empty(&self) -> bool {
        self.token.is_none() && self.owner_token.is_none() && self.user_key.is_none()
    }

    /// The full set, or `None` if any value is missing or blank.
    pub fn complete(&self) -> Option<SessionCredentials> {
        let present = |v: &Option<String>| v.as_deref().filter(|s| !s.is_empty()).map(str::to_owned);
        Some(SessionCredentials {
            token: present(&self.token)?,
            owner_token: present(&self.owner_token)?,
            user_key: present(&self.user_key)?,
        })
    }
}

/// A complete credential set for an authenticated session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCredentials {
    /// API access token (JWT).
    pub token: String,
    /// Token registered as the session owner.
    pub owner_token: String,
    /// Normalized user key the owner token was registered under.
    pub user_key: String,
}

impl From<&SessionCredentials> for StoredCredentials {
    fn from(creds: &SessionCredentials) -> Self {
        Self {
            token: Some(creds.token.clone()),
            owner_token: Some(creds.owner_token.clone()),
            user_key: Some(creds.user_key.clone()),
        }
    }
}

/// Key-value storage for [`StoredCredentials`].
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn load(&self) -> Result<StoredCredentials, WatcherError>;
    async fn save(&self, credentials: &SessionCredentials) -> Result<(), WatcherError>;
    /// Remove all stored values. Clearing empty storage succeeds.
    async fn clear(&self) -> Result<(), WatcherError>;
}

/// Stores credentials as a JSON file.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn io_error(action: &str, path: &Path, err: std::io::Error) -> WatcherError {
    WatcherError::Credentials(format!("failed to {action} {}: {err}", path.display()))
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> Result<StoredCredentials, WatcherError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(StoredCredentials::default());
            }
            Err(e) => return Err(io_error("read", &self.path, e)),
        };

        serde_json::from_slice(&bytes).map_err(|e| {
            WatcherError::Credentials(format!("corrupt credentials file {}: {e}", self.path.display()))
        })
    }

    async fn save(&self, credentials: &SessionCredentials) -> Result<(), WatcherError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error("create", parent, e))?;
        }

        let json = serde_json::to_vec_pretty(&StoredCredentials::from(credentials))
            .map_err(|e| WatcherError::Credentials(e.to_string()))?;

        // Write-then-rename so a crash never leaves a half-written file.
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| io_error("write", &tmp, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| io_error("replace", &self.path, e))
    }

    async fn clear(&self) -> Result<(), WatcherError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error("remove", &self.path, e)),
        }
    }
}

/// In-process credential storage.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    inner: Mutex<StoredCredentials>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with arbitrary (possibly partial) values.
    pub fn with(credentials: StoredCredentials) -> Self {
        Self {
            inner: Mutex::new(credentials),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self) -> Result<StoredCredentials, WatcherError> {
        Ok(self.inner.lock().await.clone())
    }

    async fn save(&self, credentials: &SessionCredentials) -> Result<(), WatcherError> {
        *self.inner.lock().await = credentials.into();
        Ok(())
    }

    async fn clear(&self) -> Result<(), WatcherError> {
        *self.inner.lock().await = StoredCredentials::default();
        Ok(())
    }
}
