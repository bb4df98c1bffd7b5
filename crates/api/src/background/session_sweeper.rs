//! Periodic removal of expired session records.
//!
//! Validation already reports expired records as `session_expired`, so the
//! sweeper only reclaims storage. Once a record is purged, a validate for it
//! reports `session_ended` instead.

use std::time::Duration;

use sessionlock_core::registry::SessionRegistry;
use tokio_util::sync::CancellationToken;

/// Run the sweep loop until `cancel` is triggered.
///
/// The first sweep runs immediately.
pub async fn run(registry: SessionRegistry, every: Duration, cancel: CancellationToken) {
    tracing::info!(
        interval_secs = every.as_secs(),
        store = registry.backend_name(),
        "Session sweeper started"
    );

    let mut interval = tokio::time::interval(every);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Session sweeper stopping");
                break;
            }
            _ = interval.tick() => {
                match registry.purge_expired().await {
                    Ok(purged) => {
                        if purged > 0 {
                            tracing::info!(purged, "Session sweeper: purged expired records");
                        } else {
                            tracing::debug!("Session sweeper: nothing to purge");
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Session sweeper: purge failed");
                    }
                }
            }
        }
    }
}
