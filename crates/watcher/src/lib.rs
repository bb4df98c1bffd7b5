//! Client-side session watcher.
//!
//! Validates a restored session before granting access, then polls the
//! session registry on a fixed cadence to detect displacement or expiry.
//! The hosting application observes the result through
//! [`SessionContext::kicked`](context::SessionContext::kicked).

pub mod auth;
pub mod config;
pub mod context;
pub mod credentials;
pub mod error;
pub mod poller;
pub mod registry;
pub mod state;

pub use context::SessionContext;
pub use state::{KickReason, SessionEvent, WatcherState};
