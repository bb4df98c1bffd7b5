//! The session context: one object owning the watcher's state, its poll
//! task, and the collaborators it talks to.

use std::sync::Arc;

use sessionlock_core::types::UserKey;
use sessionlock_core::wire::{LogoutRequest, RegisterRequest, ValidateRequest};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::auth::AuthApi;
use crate::config::WatcherSettings;
use crate::credentials::{CredentialStore, SessionCredentials};
use crate::error::{bounded, WatcherError};
use crate::poller::Poller;
use crate::registry::RegistryApi;
use crate::state::{KickReason, LoginOutcome, RestoreOutcome, SessionEvent, WatcherState};

const EVENT_CAPACITY: usize = 32;

struct PollHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Owns the session watcher for one client.
///
/// Dropping the context stops polling. Stored credentials are left alone so
/// the next process can restore them.
pub struct SessionContext {
    registry: Arc<dyn RegistryApi>,
    auth: Arc<dyn AuthApi>,
    credentials: Arc<dyn CredentialStore>,
    settings: WatcherSettings,
    state: Arc<watch::Sender<WatcherState>>,
    events: broadcast::Sender<SessionEvent>,
    session: Option<SessionCredentials>,
    poller: Option<PollHandle>,
}

impl SessionContext {
    pub fn new(
        registry: Arc<dyn RegistryApi>,
        auth: Arc<dyn AuthApi>,
        credentials: Arc<dyn CredentialStore>,
        settings: WatcherSettings,
    ) -> Self {
        let (state, _) = watch::channel(WatcherState::Unauthenticated);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            registry,
            auth,
            credentials,
            settings,
            state: Arc::new(state),
            events,
            session: None,
            poller: None,
        }
    }

    pub fn state(&self) -> WatcherState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<WatcherState> {
        self.state.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Resolve with the reason once the session is kicked.
    ///
    /// Resolves immediately if the context is already in the kicked state.
    /// Returns `None` if the context is dropped first. The returned future
    /// does not borrow the context.
    pub fn kicked(&self) -> impl std::future::Future<Output = Option<KickReason>> + Send + 'static {
        let mut rx = self.state.subscribe();
        async move {
            let state = rx
                .wait_for(|s| matches!(s, WatcherState::Kicked(_)))
                .await
                .ok()?;
            match *state {
                WatcherState::Kicked(reason) => Some(reason),
                _ => None,
            }
        }
    }

    /// Whether a poll task is currently running.
    pub fn is_polling(&self) -> bool {
        self.poller.as_ref().is_some_and(|p| !p.task.is_finished())
    }

    /// Credentials of the active session, if any.
    pub fn session(&self) -> Option<&SessionCredentials> {
        match self.state() {
            WatcherState::Active => self.session.as_ref(),
            _ => None,
        }
    }

    /// The API access token of the active session, if any.
    pub fn access_token(&self) -> Option<&str> {
        self.session().map(|s| s.token.as_str())
    }

    /// Try to resume a previous session from stored credentials.
    ///
    /// Any failure short of `{valid:true}` purges the stored credentials,
    /// including an unreachable registry: restore fails closed.
    pub async fn restore(&mut self) -> RestoreOutcome {
        self.stop_polling().await;
        self.session = None;

        let stored = match self.credentials.load().await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(error = %e, "Stored credentials unreadable, discarding");
                self.purge_credentials().await;
                self.set_state(WatcherState::Unauthenticated);
                return RestoreOutcome::NoCredentials;
            }
        };

        let Some(session) = stored.complete() else {
            if !stored.is_empty() {
                tracing::info!("Incomplete stored credentials, discarding");
                self.purge_credentials().await;
            }
            self.set_state(WatcherState::Unauthenticated);
            return RestoreOutcome::NoCredentials;
        };

        self.set_state(WatcherState::Validating);

        let request = ValidateRequest {
            user_key: session.user_key.clone(),
            token: session.owner_token.clone(),
        };
        let result = bounded(self.settings.request_timeout, self.registry.validate(&request)).await;

        match result {
            Ok(response) if response.valid => {
                tracing::info!(user_key = %session.user_key, "Session restored");
                self.activate(session, true);
                RestoreOutcome::Restored
            }
            Ok(response) => {
                let reason = KickReason::from_wire(response.reason.as_deref());
                tracing::info!(user_key = %session.user_key, %reason, "Stored session no longer valid");
                self.purge_credentials().await;
                self.set_state(WatcherState::Unauthenticated);
                RestoreOutcome::Rejected(reason)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Session registry unreachable during restore, requiring login");
                self.purge_credentials().await;
                self.set_state(WatcherState::Unauthenticated);
                RestoreOutcome::Unreachable
            }
        }
    }

    /// Log in, claim the session for this client, and start polling.
    ///
    /// Authentication errors are returned. A registry failure is not: the
    /// session proceeds without cross-device locking and without polling,
    /// and [`LoginOutcome::locked`] is `false`.
    pub async fn login(&mut self, email: &str, password: &str) -> Result<LoginOutcome, WatcherError> {
        self.stop_polling().await;

        let user_key = UserKey::parse(email)?;
        let token = bounded(
            self.settings.request_timeout,
            self.auth.login(user_key.as_str(), password),
        )
        .await?;

        let owner_token = uuid::Uuid::new_v4().to_string();
        let request = RegisterRequest {
            user_key: user_key.to_string(),
            token: owner_token.clone(),
            device: self.settings.device_label.clone(),
            expiry_days: Some(self.settings.ttl_days),
        };

        let locked = match bounded(self.settings.request_timeout, self.registry.register(&request)).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    user_key = %user_key,
                    error = %e,
                    "Session registration failed, proceeding without cross-device locking"
                );
                false
            }
        };

        let session = SessionCredentials {
            token,
            owner_token,
            user_key: user_key.to_string(),
        };
        self.credentials.save(&session).await?;

        tracing::info!(user_key = %user_key, locked, "Logged in");
        self.activate(session, locked);

        Ok(LoginOutcome { locked })
    }

    /// End the session locally and tell the registry.
    ///
    /// Local state is cleared before the registry call, which runs on a
    /// detached task and is best-effort. The handle is returned for callers
    /// that want to wait for it.
    ///
    /// The registry is only told when this context holds the active session.
    /// A kicked or unvalidated context sends nothing: registry logout is not
    /// token-checked and would end the current owner's session.
    pub async fn logout(&mut self) -> Option<JoinHandle<()>> {
        self.stop_polling().await;

        let was_active = self.state() == WatcherState::Active;
        let session = self.session.take();

        self.purge_credentials().await;
        self.set_state(WatcherState::Unauthenticated);
        let _ = self.events.send(SessionEvent::LoggedOut);

        let session = session.filter(|_| was_active)?;
        tracing::info!(user_key = %session.user_key, "Logged out");

        let registry = Arc::clone(&self.registry);
        let timeout = self.settings.request_timeout;
        Some(tokio::spawn(async move {
            let request = LogoutRequest {
                user_key: session.user_key,
                token: session.owner_token,
            };
            if let Err(e) = bounded(timeout, registry.logout(&request)).await {
                tracing::debug!(error = %e, "Registry logout failed");
            }
        }))
    }

    /// Stop polling without touching stored credentials.
    ///
    /// The poll task is aborted, so a kick in progress never lands.
    pub fn teardown(&mut self) {
        self.abort_polling();
    }

    fn activate(&mut self, session: SessionCredentials, poll: bool) {
        if poll {
            let cancel = CancellationToken::new();
            let poller = Poller {
                registry: Arc::clone(&self.registry),
                credentials: Arc::clone(&self.credentials),
                session: session.clone(),
                interval: self.settings.poll_interval,
                request_timeout: self.settings.request_timeout,
                state: Arc::clone(&self.state),
                events: self.events.clone(),
            };
            let task = tokio::spawn(poller.run(cancel.clone()));
            self.poller = Some(PollHandle { cancel, task });
        }

        self.session = Some(session);
        self.set_state(WatcherState::Active);
        let _ = self.events.send(SessionEvent::Activated { locked: poll });
    }

    /// Cancel the poll task and wait for it to finish, so nothing it does
    /// can land after the caller moves on.
    async fn stop_polling(&mut self) {
        if let Some(handle) = self.poller.take() {
            handle.cancel.cancel();
            if let Err(e) = handle.task.await {
                if e.is_panic() {
                    tracing::error!(error = %e, "Session poll task panicked");
                }
            }
        }
    }

    fn abort_polling(&mut self) {
        if let Some(handle) = self.poller.take() {
            handle.cancel.cancel();
            handle.task.abort();
        }
    }

    fn set_state(&self, state: WatcherState) {
        self.state.send_replace(state);
    }

    async fn purge_credentials(&self) {
        if let Err(e) = self.credentials.clear().await {
            tracing::error!(error = %e, "Failed to purge stored credentials");
        }
    }
}

impl Drop for SessionContext {
    fn drop(&mut self) {
        self.abort_polling();
    }
}
