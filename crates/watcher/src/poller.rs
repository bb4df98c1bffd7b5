//! Periodic ownership check against the session registry.
//!
//! Each tick produces exactly one [`PollOutcome`]. Only an explicit
//! `{valid:false}` ends the loop; transport failures are counted and
//! tolerated indefinitely.

use std::sync::Arc;
use std::time::Duration;

use sessionlock_core::wire::{ValidateRequest, ValidateResponse};
use tokio::sync::{broadcast, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::credentials::{CredentialStore, SessionCredentials};
use crate::error::{bounded, WatcherError};
use crate::registry::RegistryApi;
use crate::state::{KickReason, SessionEvent, WatcherState};

/// Consecutive failures after which the session is considered offline.
/// Failures up to this count are logged at `warn`; later ones are quiet.
pub const OFFLINE_THRESHOLD: u32 = 3;

/// Result of a single poll.
#[derive(Debug)]
pub enum PollOutcome {
    Valid,
    /// Terminal: the registry says this client no longer owns the session.
    Invalid(KickReason),
    /// The registry could not be asked. Says nothing about ownership.
    TransientFailure(WatcherError),
}

impl PollOutcome {
    pub fn classify(result: Result<ValidateResponse, WatcherError>) -> Self {
        match result {
            Ok(response) if response.valid => Self::Valid,
            Ok(response) => Self::Invalid(KickReason::from_wire(response.reason.as_deref())),
            Err(err) => Self::TransientFailure(err),
        }
    }
}

/// Counts consecutive transient failures.
#[derive(Debug, Default)]
pub struct FailureTracker {
    consecutive: u32,
}

impl FailureTracker {
    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }

    /// Record a failure and return the new consecutive count.
    pub fn record_failure(&mut self) -> u32 {
        self.consecutive = self.consecutive.saturating_add(1);
        self.consecutive
    }

    /// Reset the counter. Returns the previous count if it was non-zero.
    pub fn record_success(&mut self) -> Option<u32> {
        let previous = std::mem::take(&mut self.consecutive);
        (previous > 0).then_some(previous)
    }
}

/// Everything the poll task needs, moved into the spawned task.
pub(crate) struct Poller {
    pub registry: Arc<dyn RegistryApi>,
    pub credentials: Arc<dyn CredentialStore>,
    pub session: SessionCredentials,
    pub interval: Duration,
    pub request_timeout: Duration,
    pub state: Arc<watch::Sender<WatcherState>>,
    pub events: broadcast::Sender<SessionEvent>,
}

impl Poller {
    /// Poll until kicked or cancelled.
    ///
    /// The first poll happens one interval after start. Each tick awaits its
    /// request before the next tick is taken, and late ticks are delayed
    /// rather than bursted, so requests never overlap or pile up.
    pub(crate) async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut failures = FailureTracker::default();

        tracing::debug!(
            user_key = %self.session.user_key,
            interval_secs = self.interval.as_secs(),
            "Session polling started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let outcome = tokio::select! {
                _ = cancel.cancelled() => break,
                outcome = self.poll_once() => outcome,
            };

            match outcome {
                PollOutcome::Valid => {
                    if let Some(after_failures) = failures.record_success() {
                        tracing::info!(after_failures, "Session registry reachable again");
                        let _ = self.events.send(SessionEvent::Recovered { after_failures });
                    }
                }
                PollOutcome::TransientFailure(err) => {
                    let consecutive = failures.record_failure();
                    if consecutive <= OFFLINE_THRESHOLD {
                        tracing::warn!(consecutive, error = %err, "Session check failed, will retry");
                    } else {
                        tracing::debug!(consecutive, error = %err, "Session check failed");
                    }
                    let _ = self.events.send(SessionEvent::Degraded {
                        consecutive_failures: consecutive,
                    });
                    if consecutive == OFFLINE_THRESHOLD {
                        let _ = self.events.send(SessionEvent::Offline);
                    }
                }
                PollOutcome::Invalid(reason) => {
                    if !cancel.is_cancelled() {
                        self.kick(reason, &cancel).await;
                    }
                    break;
                }
            }
        }

        tracing::debug!("Session polling stopped");
    }

    async fn poll_once(&self) -> PollOutcome {
        let request = ValidateRequest {
            user_key: self.session.user_key.clone(),
            token: self.session.owner_token.clone(),
        };
        let result = bounded(self.request_timeout, self.registry.validate(&request)).await;
        PollOutcome::classify(result)
    }

    /// Purge credentials and enter `Kicked`.
    ///
    /// The state only moves from `Active`, and not at all once `cancel` has
    /// fired, so a kick racing a re-login or logout leaves the new state
    /// alone.
    async fn kick(&self, reason: KickReason, cancel: &CancellationToken) {
        tracing::warn!(user_key = %self.session.user_key, %reason, "Session revoked by registry");

        if let Err(e) = self.credentials.clear().await {
            tracing::error!(error = %e, "Failed to purge credentials after kick");
        }
        if cancel.is_cancelled() {
            tracing::debug!("Poller cancelled during kick, leaving state unchanged");
            return;
        }

        let kicked = self.state.send_if_modified(|state| {
            if *state == WatcherState::Active {
                *state = WatcherState::Kicked(reason);
                true
            } else {
                false
            }
        });
        if kicked {
            let _ = self.events.send(SessionEvent::Kicked(reason));
        }
    }
}
