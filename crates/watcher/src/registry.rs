//! HTTP client for the session registry endpoints.

use std::time::Duration;

use async_trait::async_trait;
use sessionlock_core::wire::{LogoutRequest, RegisterRequest, ValidateRequest, ValidateResponse};

use crate::error::WatcherError;

/// The three registry calls the watcher makes.
///
/// Abstracted so the session context can be driven by a scripted registry
/// in tests.
#[async_trait]
pub trait RegistryApi: Send + Sync {
    async fn register(&self, request: &RegisterRequest) -> Result<(), WatcherError>;
    async fn validate(&self, request: &ValidateRequest) -> Result<ValidateResponse, WatcherError>;
    async fn logout(&self, request: &LogoutRequest) -> Result<(), WatcherError>;
}

/// [`RegistryApi`] over HTTP using [`reqwest`].
pub struct RegistryClient {
    client: reqwest::Client,
    base_url: String,
}

impl RegistryClient {
    /// Create a client for the registry at `base_url`, e.g.
    /// `http://localhost:3000`. Every request is bounded by `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, WatcherError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn post<B: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, WatcherError> {
        let response = self
            .client
            .post(format!("{}/session/{path}", self.base_url))
            .json(body)
            .send()
            .await
            .map_err(WatcherError::from_reqwest)?;

        ensure_success(response).await
    }
}

#[async_trait]
impl RegistryApi for RegistryClient {
    async fn register(&self, request: &RegisterRequest) -> Result<(), WatcherError> {
        self.post("register", request).await?;
        Ok(())
    }

    async fn validate(&self, request: &ValidateRequest) -> Result<ValidateResponse, WatcherError> {
        let response = self.post("validate", request).await?;
        response
            .json::<ValidateResponse>()
            .await
            .map_err(WatcherError::from_reqwest)
    }

    async fn logout(&self, request: &LogoutRequest) -> Result<(), WatcherError> {
        self.post("logout", request).await?;
        Ok(())
    }
}

/// Ensure the response has a success status code. Returns the response
/// unchanged on success, or [`WatcherError::Api`] with the status and body
/// text on failure.
pub(crate) async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, WatcherError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        return Err(WatcherError::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}
