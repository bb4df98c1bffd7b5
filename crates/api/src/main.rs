use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use sessionlock_core::registry::SessionRegistry;
use sessionlock_core::store::{MemorySessionStore, SessionStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sessionlock_api::background;
use sessionlock_api::config::{ServerConfig, StoreBackend};
use sessionlock_api::router::build_app_router;
use sessionlock_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sessionlock_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        store = ?config.session.store,
        "Loaded server configuration"
    );
    if config.users.is_empty() {
        tracing::warn!("No login account configured; POST /api/login will reject every attempt");
    }

    // --- Session store ---
    let (store, pool): (Arc<dyn SessionStore>, _) = match config.session.store {
        StoreBackend::Memory => (
            Arc::new(MemorySessionStore::new()) as Arc<dyn SessionStore>,
            None,
        ),
        StoreBackend::Postgres => {
            let database_url = config
                .session
                .database_url
                .as_deref()
                .expect("DATABASE_URL must be set");

            let pool = sessionlock_db::create_pool(database_url)
                .await
                .expect("Failed to connect to database");
            tracing::info!("Database connection pool created");

            sessionlock_db::health_check(&pool)
                .await
                .expect("Database health check failed");

            sessionlock_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database migrations applied");

            (
                Arc::new(sessionlock_db::PgSessionStore::new(pool.clone())) as Arc<dyn SessionStore>,
                Some(pool),
            )
        }
    };

    let registry = SessionRegistry::new(store, config.session.ttl_policy());

    // --- Expiry sweeper ---
    let sweeper_cancel = tokio_util::sync::CancellationToken::new();
    let sweeper_handle = tokio::spawn(background::session_sweeper::run(
        registry.clone(),
        Duration::from_secs(config.session.sweep_interval_secs),
        sweeper_cancel.clone(),
    ));

    // --- App state ---
    let state = AppState {
        registry,
        pool,
        config: Arc::new(config.clone()),
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    sweeper_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), sweeper_handle).await;
    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
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
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
