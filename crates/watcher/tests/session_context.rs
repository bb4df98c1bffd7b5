//! Behaviour of `SessionContext` against a scripted registry.
//!
//! All tests run on paused time, so the 20-second cadence is simulated and
//! the assertions about when polls happen are exact.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use sessionlock_core::session::InvalidReason;
use sessionlock_core::wire::{LogoutRequest, RegisterRequest, ValidateRequest, ValidateResponse};
use tokio::sync::broadcast;

use sessionlock_watcher::auth::AuthApi;
use sessionlock_watcher::config::WatcherSettings;
use sessionlock_watcher::credentials::{
    CredentialStore, MemoryCredentialStore, SessionCredentials, StoredCredentials,
};
use sessionlock_watcher::error::WatcherError;
use sessionlock_watcher::registry::RegistryApi;
use sessionlock_watcher::state::{RestoreOutcome, SessionEvent};
use sessionlock_watcher::{KickReason, SessionContext, WatcherState};

const TICK: Duration = Duration::from_secs(20);

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

/// Registry whose validate answers come from a script. Once the script is
/// exhausted every validate reports `{valid:true}`.
#[derive(Default)]
struct ScriptedRegistry {
    script: Mutex<VecDeque<Result<ValidateResponse, WatcherError>>>,
    fail_register: AtomicBool,
    hang_register: AtomicBool,
    registers: Mutex<Vec<RegisterRequest>>,
    validates: AtomicUsize,
    logouts: Mutex<Vec<LogoutRequest>>,
}

impl ScriptedRegistry {
    fn with_script(script: Vec<Result<ValidateResponse, WatcherError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            ..Default::default()
        })
    }

    fn validate_calls(&self) -> usize {
        self.validates.load(Ordering::SeqCst)
    }
}

fn network_error() -> Result<ValidateResponse, WatcherError> {
    Err(WatcherError::Api {
        status: 502,
        body: "bad gateway".into(),
    })
}

fn invalid(reason: InvalidReason) -> Result<ValidateResponse, WatcherError> {
    Ok(ValidateResponse::invalid(reason))
}

#[async_trait]
impl RegistryApi for ScriptedRegistry {
    async fn register(&self, request: &RegisterRequest) -> Result<(), WatcherError> {
        self.registers.lock().unwrap().push(request.clone());
        if self.hang_register.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail_register.load(Ordering::SeqCst) {
            return Err(WatcherError::Api {
                status: 503,
                body: "unavailable".into(),
            });
        }
        Ok(())
    }

    async fn validate(&self, _request: &ValidateRequest) -> Result<ValidateResponse, WatcherError> {
        self.validates.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ValidateResponse::valid()))
    }

    async fn logout(&self, request: &LogoutRequest) -> Result<(), WatcherError> {
        self.logouts.lock().unwrap().push(request.clone());
        Ok(())
    }
}

struct FixedAuth;

#[async_trait]
impl AuthApi for FixedAuth {
    async fn login(&self, email: &str, password: &str) -> Result<String, WatcherError> {
        if password == "secret" {
            Ok(format!("jwt-for-{email}"))
        } else {
            Err(WatcherError::Api {
                status: 401,
                body: r#"{"error":"Invalid credentials","code":"UNAUTHORIZED"}"#.into(),
            })
        }
    }
}

/// Credential store whose `clear` takes a while, so a kick can still be
/// running when the context moves on.
struct SlowClearStore {
    inner: MemoryCredentialStore,
    delay: Duration,
}

#[async_trait]
impl CredentialStore for SlowClearStore {
    async fn load(&self) -> Result<StoredCredentials, WatcherError> {
        self.inner.load().await
    }

    async fn save(&self, credentials: &SessionCredentials) -> Result<(), WatcherError> {
        self.inner.save(credentials).await
    }

    async fn clear(&self) -> Result<(), WatcherError> {
        tokio::time::sleep(self.delay).await;
        self.inner.clear().await
    }
}

fn settings() -> WatcherSettings {
    WatcherSettings {
        poll_interval: TICK,
        request_timeout: Duration::from_secs(20),
        ttl_days: 1.0,
        device_label: "Mac".into(),
    }
}

fn context(
    registry: Arc<ScriptedRegistry>,
    credentials: Arc<MemoryCredentialStore>,
) -> SessionContext {
    SessionContext::new(registry, Arc::new(FixedAuth), credentials, settings())
}

fn stored(token: &str, owner: &str, user: &str) -> StoredCredentials {
    StoredCredentials {
        token: Some(token.into()),
        owner_token: Some(owner.into()),
        user_key: Some(user.into()),
    }
}

fn drain(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Sleep until just after the `n`-th poll tick since login.
async fn after_ticks(n: u32) {
    tokio::time::sleep(TICK * n + Duration::from_secs(1)).await;
}

// ---------------------------------------------------------------------------
// Login
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn login_registers_owner_token_and_starts_polling() {
    let registry = Arc::new(ScriptedRegistry::default());
    let credentials = Arc::new(MemoryCredentialStore::new());
    let mut ctx = context(registry.clone(), credentials.clone());

    let outcome = ctx.login(" A@X.com ", "secret").await.unwrap();

    assert!(outcome.locked);
    assert_eq!(ctx.state(), WatcherState::Active);
    assert!(ctx.is_polling());
    assert_eq!(ctx.access_token(), Some("jwt-for-a@x.com"));

    let registers = registry.registers.lock().unwrap().clone();
    assert_eq!(registers.len(), 1);
    assert_eq!(registers[0].user_key, "a@x.com");
    assert_eq!(registers[0].device, "Mac");
    assert_eq!(registers[0].expiry_days, Some(1.0));
    assert_eq!(registers[0].token.len(), 36);

    let saved = credentials.load().await.unwrap().complete().unwrap();
    assert_eq!(saved.owner_token, registers[0].token);
    assert_eq!(saved.user_key, "a@x.com");
}

#[tokio::test(start_paused = true)]
async fn each_login_uses_a_fresh_owner_token() {
    let registry = Arc::new(ScriptedRegistry::default());
    let mut ctx = context(registry.clone(), Arc::new(MemoryCredentialStore::new()));

    ctx.login("a@x.com", "secret").await.unwrap();
    ctx.login("a@x.com", "secret").await.unwrap();

    let registers = registry.registers.lock().unwrap().clone();
    assert_ne!(registers[0].token, registers[1].token);
}

#[tokio::test(start_paused = true)]
async fn login_with_bad_password_returns_error_and_registers_nothing() {
    let registry = Arc::new(ScriptedRegistry::default());
    let credentials = Arc::new(MemoryCredentialStore::new());
    let mut ctx = context(registry.clone(), credentials.clone());

    let result = ctx.login("a@x.com", "wrong").await;

    assert_matches!(result, Err(WatcherError::Api { status: 401, .. }));
    assert_eq!(ctx.state(), WatcherState::Unauthenticated);
    assert!(registry.registers.lock().unwrap().is_empty());
    assert!(credentials.load().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn register_failure_fails_open_without_polling() {
    let registry = Arc::new(ScriptedRegistry::default());
    registry.fail_register.store(true, Ordering::SeqCst);
    let credentials = Arc::new(MemoryCredentialStore::new());
    let mut ctx = context(registry.clone(), credentials.clone());

    let outcome = ctx.login("a@x.com", "secret").await.unwrap();

    assert!(!outcome.locked);
    assert_eq!(ctx.state(), WatcherState::Active);
    assert!(!ctx.is_polling());
    assert!(credentials.load().await.unwrap().complete().is_some());

    after_ticks(3).await;
    assert_eq!(registry.validate_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn register_timeout_fails_open() {
    let registry = Arc::new(ScriptedRegistry::default());
    registry.hang_register.store(true, Ordering::SeqCst);
    let mut ctx = context(registry.clone(), Arc::new(MemoryCredentialStore::new()));

    let outcome = ctx.login("a@x.com", "secret").await.unwrap();

    assert!(!outcome.locked);
    assert_eq!(ctx.state(), WatcherState::Active);
}

// ---------------------------------------------------------------------------
// Polling
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn polls_once_per_interval() {
    let registry = Arc::new(ScriptedRegistry::default());
    let mut ctx = context(registry.clone(), Arc::new(MemoryCredentialStore::new()));
    ctx.login("a@x.com", "secret").await.unwrap();

    tokio::time::sleep(TICK - Duration::from_secs(1)).await;
    assert_eq!(registry.validate_calls(), 0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(registry.validate_calls(), 1);

    tokio::time::sleep(TICK).await;
    assert_eq!(registry.validate_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn consecutive_network_failures_never_kick() {
    let registry = ScriptedRegistry::with_script(vec![
        network_error(),
        network_error(),
        network_error(),
        network_error(),
    ]);
    let mut ctx = context(registry.clone(), Arc::new(MemoryCredentialStore::new()));
    let mut events = ctx.subscribe_events();
    ctx.login("a@x.com", "secret").await.unwrap();

    after_ticks(3).await;
    assert_eq!(registry.validate_calls(), 3);
    assert_eq!(ctx.state(), WatcherState::Active);
    assert!(ctx.is_polling());

    after_ticks(1).await;
    assert_eq!(registry.validate_calls(), 4);
    assert_eq!(ctx.state(), WatcherState::Active);
    assert!(ctx.is_polling());

    // Script exhausted: the next poll succeeds.
    after_ticks(1).await;
    assert_eq!(
        drain(&mut events),
        vec![
            SessionEvent::Activated { locked: true },
            SessionEvent::Degraded { consecutive_failures: 1 },
            SessionEvent::Degraded { consecutive_failures: 2 },
            SessionEvent::Degraded { consecutive_failures: 3 },
            SessionEvent::Offline,
            SessionEvent::Degraded { consecutive_failures: 4 },
            SessionEvent::Recovered { after_failures: 4 },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn invalid_response_kicks_and_purges_credentials() {
    let registry = ScriptedRegistry::with_script(vec![
        Ok(ValidateResponse::valid()),
        invalid(InvalidReason::SessionDisplaced),
    ]);
    let credentials = Arc::new(MemoryCredentialStore::new());
    let mut ctx = context(registry.clone(), credentials.clone());
    let kicked = ctx.kicked();
    ctx.login("a@x.com", "secret").await.unwrap();

    after_ticks(2).await;

    assert_eq!(ctx.state(), WatcherState::Kicked(KickReason::Displaced));
    assert_eq!(kicked.await, Some(KickReason::Displaced));
    assert!(!ctx.is_polling());
    assert!(ctx.access_token().is_none());
    assert!(credentials.load().await.unwrap().is_empty());

    after_ticks(3).await;
    assert_eq!(registry.validate_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn failures_then_invalid_still_kicks() {
    let registry = ScriptedRegistry::with_script(vec![
        network_error(),
        network_error(),
        invalid(InvalidReason::SessionExpired),
    ]);
    let mut ctx = context(registry, Arc::new(MemoryCredentialStore::new()));
    ctx.login("a@x.com", "secret").await.unwrap();

    after_ticks(3).await;

    assert_eq!(ctx.state(), WatcherState::Kicked(KickReason::Expired));
}

#[tokio::test(start_paused = true)]
async fn unknown_reason_kicks_as_ended() {
    let registry = ScriptedRegistry::with_script(vec![Ok(ValidateResponse {
        valid: false,
        reason: Some("account_suspended".into()),
    })]);
    let mut ctx = context(registry, Arc::new(MemoryCredentialStore::new()));
    ctx.login("a@x.com", "secret").await.unwrap();

    after_ticks(1).await;

    assert_eq!(ctx.state(), WatcherState::Kicked(KickReason::Ended));
}

#[tokio::test(start_paused = true)]
async fn login_after_kick_resumes_watching() {
    let registry = ScriptedRegistry::with_script(vec![invalid(InvalidReason::SessionDisplaced)]);
    let mut ctx = context(registry.clone(), Arc::new(MemoryCredentialStore::new()));
    ctx.login("a@x.com", "secret").await.unwrap();
    after_ticks(1).await;
    assert_matches!(ctx.state(), WatcherState::Kicked(_));

    ctx.login("a@x.com", "secret").await.unwrap();

    assert_eq!(ctx.state(), WatcherState::Active);
    assert!(ctx.is_polling());
    after_ticks(1).await;
    assert_eq!(registry.validate_calls(), 2);
    assert_eq!(ctx.state(), WatcherState::Active);
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn logout_stops_polling_and_notifies_registry() {
    let registry = Arc::new(ScriptedRegistry::default());
    let credentials = Arc::new(MemoryCredentialStore::new());
    let mut ctx = context(registry.clone(), credentials.clone());
    ctx.login("a@x.com", "secret").await.unwrap();
    let owner = credentials.load().await.unwrap().owner_token.unwrap();

    let notify = ctx.logout().await.expect("registry logout should be sent");
    notify.await.unwrap();

    assert_eq!(ctx.state(), WatcherState::Unauthenticated);
    assert!(!ctx.is_polling());
    assert!(credentials.load().await.unwrap().is_empty());

    let logouts = registry.logouts.lock().unwrap().clone();
    assert_eq!(logouts.len(), 1);
    assert_eq!(logouts[0].user_key, "a@x.com");
    assert_eq!(logouts[0].token, owner);

    after_ticks(5).await;
    assert_eq!(registry.validate_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn logout_after_kick_does_not_notify_registry() {
    let registry = ScriptedRegistry::with_script(vec![invalid(InvalidReason::SessionDisplaced)]);
    let mut ctx = context(registry.clone(), Arc::new(MemoryCredentialStore::new()));
    ctx.login("a@x.com", "secret").await.unwrap();
    after_ticks(1).await;
    assert_eq!(ctx.state(), WatcherState::Kicked(KickReason::Displaced));

    assert!(ctx.logout().await.is_none());

    assert_eq!(ctx.state(), WatcherState::Unauthenticated);
    assert!(registry.logouts.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn logout_of_unvalidated_stored_session_sends_nothing() {
    let registry = Arc::new(ScriptedRegistry::default());
    let credentials = Arc::new(MemoryCredentialStore::with(stored("jwt", "T1", "a@x.com")));
    let mut ctx = context(registry.clone(), credentials.clone());

    assert!(ctx.logout().await.is_none());

    assert!(credentials.load().await.unwrap().is_empty());
    assert!(registry.logouts.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn kick_in_flight_does_not_override_relogin() {
    let registry = ScriptedRegistry::with_script(vec![invalid(InvalidReason::SessionDisplaced)]);
    let credentials = Arc::new(SlowClearStore {
        inner: MemoryCredentialStore::new(),
        delay: Duration::from_secs(5),
    });
    let mut ctx = SessionContext::new(
        registry.clone(),
        Arc::new(FixedAuth),
        credentials.clone(),
        settings(),
    );
    let mut events = ctx.subscribe_events();
    ctx.login("a@x.com", "secret").await.unwrap();

    // The first poll at 20s starts a kick whose purge runs until 25s.
    tokio::time::sleep(TICK + Duration::from_secs(1)).await;
    ctx.login("a@x.com", "secret").await.unwrap();
    assert_eq!(ctx.state(), WatcherState::Active);

    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(ctx.state(), WatcherState::Active);
    assert!(ctx.is_polling());
    assert!(credentials.load().await.unwrap().complete().is_some());
    assert_eq!(registry.validate_calls(), 1);
    assert!(!drain(&mut events)
        .iter()
        .any(|e| matches!(e, SessionEvent::Kicked(_))));
}

#[tokio::test(start_paused = true)]
async fn teardown_during_kick_leaves_state_untouched() {
    let registry = ScriptedRegistry::with_script(vec![invalid(InvalidReason::SessionDisplaced)]);
    let credentials = Arc::new(SlowClearStore {
        inner: MemoryCredentialStore::new(),
        delay: Duration::from_secs(5),
    });
    let mut ctx = SessionContext::new(
        registry.clone(),
        Arc::new(FixedAuth),
        credentials.clone(),
        settings(),
    );
    ctx.login("a@x.com", "secret").await.unwrap();

    tokio::time::sleep(TICK + Duration::from_secs(1)).await;
    ctx.teardown();
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(ctx.state(), WatcherState::Active);
    assert!(!ctx.is_polling());
    assert!(credentials.load().await.unwrap().complete().is_some());
}

#[tokio::test(start_paused = true)]
async fn logout_without_session_sends_nothing() {
    let registry = Arc::new(ScriptedRegistry::default());
    let mut ctx = context(registry.clone(), Arc::new(MemoryCredentialStore::new()));

    assert!(ctx.logout().await.is_none());
    assert!(registry.logouts.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn teardown_stops_timer_and_keeps_credentials() {
    let registry = Arc::new(ScriptedRegistry::default());
    let credentials = Arc::new(MemoryCredentialStore::new());
    let mut ctx = context(registry.clone(), credentials.clone());
    ctx.login("a@x.com", "secret").await.unwrap();

    ctx.teardown();

    after_ticks(5).await;
    assert_eq!(registry.validate_calls(), 0);
    assert!(!ctx.is_polling());
    assert!(credentials.load().await.unwrap().complete().is_some());
}

#[tokio::test(start_paused = true)]
async fn dropping_context_stops_polling() {
    let registry = Arc::new(ScriptedRegistry::default());
    let mut ctx = context(registry.clone(), Arc::new(MemoryCredentialStore::new()));
    ctx.login("a@x.com", "secret").await.unwrap();
    let kicked = ctx.kicked();

    drop(ctx);

    after_ticks(5).await;
    assert_eq!(registry.validate_calls(), 0);
    assert_eq!(kicked.await, None);
}

// ---------------------------------------------------------------------------
// Restore
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn restore_valid_session_activates_and_polls() {
    let registry = Arc::new(ScriptedRegistry::default());
    let credentials = Arc::new(MemoryCredentialStore::with(stored("jwt", "T1", "a@x.com")));
    let mut ctx = context(registry.clone(), credentials);

    assert_eq!(ctx.restore().await, RestoreOutcome::Restored);
    assert_eq!(ctx.state(), WatcherState::Active);
    assert_eq!(ctx.access_token(), Some("jwt"));
    assert!(ctx.is_polling());
    assert_eq!(registry.validate_calls(), 1);

    after_ticks(1).await;
    assert_eq!(registry.validate_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn restore_rejected_session_purges_credentials() {
    let registry = ScriptedRegistry::with_script(vec![invalid(InvalidReason::SessionDisplaced)]);
    let credentials = Arc::new(MemoryCredentialStore::with(stored("jwt", "T1", "a@x.com")));
    let mut ctx = context(registry, credentials.clone());

    assert_eq!(
        ctx.restore().await,
        RestoreOutcome::Rejected(KickReason::Displaced)
    );
    assert_eq!(ctx.state(), WatcherState::Unauthenticated);
    assert!(!ctx.is_polling());
    assert!(credentials.load().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn restore_fails_closed_when_registry_unreachable() {
    let registry = ScriptedRegistry::with_script(vec![network_error()]);
    let credentials = Arc::new(MemoryCredentialStore::with(stored("jwt", "T1", "a@x.com")));
    let mut ctx = context(registry, credentials.clone());

    assert_eq!(ctx.restore().await, RestoreOutcome::Unreachable);
    assert_eq!(ctx.state(), WatcherState::Unauthenticated);
    assert!(credentials.load().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn restore_with_partial_credentials_purges_without_asking() {
    let registry = Arc::new(ScriptedRegistry::default());
    let partial = StoredCredentials {
        token: Some("jwt".into()),
        owner_token: None,
        user_key: Some("a@x.com".into()),
    };
    let credentials = Arc::new(MemoryCredentialStore::with(partial));
    let mut ctx = context(registry.clone(), credentials.clone());

    assert_eq!(ctx.restore().await, RestoreOutcome::NoCredentials);
    assert_eq!(registry.validate_calls(), 0);
    assert!(credentials.load().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn restore_with_nothing_stored_needs_login() {
    let registry = Arc::new(ScriptedRegistry::default());
    let mut ctx = context(registry.clone(), Arc::new(MemoryCredentialStore::new()));

    assert_eq!(ctx.restore().await, RestoreOutcome::NoCredentials);
    assert_eq!(ctx.state(), WatcherState::Unauthenticated);
    assert_eq!(registry.validate_calls(), 0);
}
