//! `sessionlock-watcher` -- keeps a single-session login alive.
//!
//! Restores the stored session (or logs in with `LOGIN_EMAIL` /
//! `LOGIN_PASSWORD`), then polls the session registry until the session is
//! displaced or expires, or until interrupted. Run with `logout` as the
//! only argument to end the stored session instead.
//!
//! See [`WatcherConfig::from_env`] for environment variables.

use std::sync::Arc;

use sessionlock_watcher::auth::AuthClient;
use sessionlock_watcher::config::WatcherConfig;
use sessionlock_watcher::credentials::FileCredentialStore;
use sessionlock_watcher::registry::RegistryClient;
use sessionlock_watcher::state::{RestoreOutcome, SessionEvent};
use sessionlock_watcher::SessionContext;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sessionlock_watcher=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WatcherConfig::from_env().unwrap_or_else(|e| {
        tracing::error!("{e}");
        std::process::exit(1);
    });

    let timeout = config.settings.request_timeout;
    let registry = RegistryClient::new(&config.registry_url, timeout).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to build registry client");
        std::process::exit(1);
    });
    let auth = AuthClient::new(&config.api_url, timeout).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to build auth client");
        std::process::exit(1);
    });

    tracing::info!(
        registry_url = %config.registry_url,
        device = %config.settings.device_label,
        poll_interval_secs = config.settings.poll_interval.as_secs(),
        "Starting sessionlock-watcher",
    );

    let mut ctx = SessionContext::new(
        Arc::new(registry),
        Arc::new(auth),
        Arc::new(FileCredentialStore::new(&config.credentials_path)),
        config.settings.clone(),
    );

    if std::env::args().nth(1).as_deref() == Some("logout") {
        // Only a session the registry still recognises is ended remotely.
        let outcome = ctx.restore().await;
        tracing::debug!(?outcome, "Checked stored session before logout");
        if let Some(notify) = ctx.logout().await {
            let _ = notify.await;
        }
        tracing::info!("Logged out");
        return;
    }

    match ctx.restore().await {
        RestoreOutcome::Restored => {}
        outcome => {
            tracing::info!(?outcome, "No session to restore");
            let Some(login) = config.login.as_ref() else {
                tracing::error!("Set LOGIN_EMAIL and LOGIN_PASSWORD to log in");
                std::process::exit(1);
            };
            if let Err(e) = ctx.login(&login.email, &login.password).await {
                tracing::error!(error = %e, "Login failed");
                std::process::exit(1);
            }
        }
    }

    let mut events = ctx.subscribe_events();
    let log_events = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                SessionEvent::Offline => tracing::warn!("Session registry unreachable, still signed in"),
                SessionEvent::Recovered { after_failures } => {
                    tracing::info!(after_failures, "Session registry reachable again")
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        reason = ctx.kicked() => {
            if let Some(reason) = reason {
                tracing::warn!(%reason, "{}", reason.message());
            }
        }
        () = shutdown_signal() => {}
    }

    ctx.teardown();
    log_events.abort();
    tracing::info!("Watcher stopped");
}

/// Wait for SIGINT (Ctrl-C) or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT (Ctrl-C), stopping"),
        () = terminate => tracing::info!("Received SIGTERM, stopping"),
    }
}
