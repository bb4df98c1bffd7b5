//! Client for the API's login endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::WatcherError;
use crate::registry::ensure_success;

#[derive(Debug, Serialize)]
struct LoginBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginReply {
    token: String,
}

/// Exchanges email and password for an API access token.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> Result<String, WatcherError>;
}

/// [`AuthApi`] calling `POST /api/login`.
pub struct AuthClient {
    client: reqwest::Client,
    base_url: String,
}

impl AuthClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, WatcherError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl AuthApi for AuthClient {
    async fn login(&self, email: &str, password: &str) -> Result<String, WatcherError> {
        let response = self
            .client
            .post(format!("{}/api/login", self.base_url))
            .json(&LoginBody { email, password })
            .send()
            .await
            .map_err(WatcherError::from_reqwest)?;

        let reply = ensure_success(response)
            .await?
            .json::<LoginReply>()
            .await
            .map_err(WatcherError::from_reqwest)?;

        Ok(reply.token)
    }
}
