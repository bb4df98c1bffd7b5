use sessionlock_core::error::CoreError;

/// Errors from the watcher's registry, auth, and credential layers.
///
/// None of these escape the poll loop: a failed poll is a transient
/// outcome, never a kick.
#[derive(Debug, thiserror::Error)]
pub enum WatcherError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server returned a non-2xx status code.
    #[error("API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The call did not complete within the client-side timeout.
    #[error("Request timed out")]
    Timeout,

    /// Local credential storage could not be read or written.
    #[error("Credential storage error: {0}")]
    Credentials(String),

    /// Input rejected before any request was made.
    #[error(transparent)]
    Invalid(#[from] CoreError),
}

impl WatcherError {
    /// Classify a reqwest failure, separating timeouts from other errors.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Request(err)
        }
    }
}

/// Await `fut`, giving up with [`WatcherError::Timeout`] after `limit`.
pub(crate) async fn bounded<T, F>(limit: std::time::Duration, fut: F) -> Result<T, WatcherError>
where
    F: std::future::Future<Output = Result<T, WatcherError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(WatcherError::Timeout),
    }
}
