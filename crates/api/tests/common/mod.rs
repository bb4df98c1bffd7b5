#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use sessionlock_core::registry::SessionRegistry;
use sessionlock_core::store::MemorySessionStore;
use tower::ServiceExt;

use sessionlock_api::auth::directory::{Account, UserDirectory};
use sessionlock_api::auth::jwt::JwtConfig;
use sessionlock_api::auth::password::hash_password;
use sessionlock_api::config::{ServerConfig, SessionConfig};
use sessionlock_api::router::build_app_router;
use sessionlock_api::state::AppState;

pub const TEST_EMAIL: &str = "admin@example.com";
pub const TEST_PASSWORD: &str = "correct-horse-battery";

/// Build a test `ServerConfig` with safe defaults and one login account.
pub fn test_config() -> ServerConfig {
    let users = UserDirectory::new(vec![Account {
        id: "1".into(),
        email: sessionlock_core::types::UserKey::parse(TEST_EMAIL).unwrap(),
        password_hash: hash_password(TEST_PASSWORD).expect("hashing should succeed"),
    }]);

    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        session: SessionConfig::default(),
        jwt: JwtConfig {
            secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
            expiry_mins: 120,
        },
        users,
    }
}

/// Build the full application router over a fresh in-memory store.
///
/// Uses [`build_app_router`] so tests exercise the production middleware
/// stack.
pub fn build_test_app() -> Router {
    build_test_app_with(test_config())
}

pub fn build_test_app_with(config: ServerConfig) -> Router {
    let registry = SessionRegistry::new(
        Arc::new(MemorySessionStore::new()),
        config.session.ttl_policy(),
    );

    let state = AppState {
        registry,
        pool: None,
        config: Arc::new(config.clone()),
    };

    build_app_router(state, &config)
}

/// Send a GET request.
pub async fn get(app: Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Send a GET request with a Bearer token.
pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header("Authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Send a POST request with a JSON body.
pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
