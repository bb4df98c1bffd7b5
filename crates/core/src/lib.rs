//! Domain types and the session registry for the single-active-session
//! service. No HTTP or database dependencies live here.

pub mod error;
pub mod registry;
pub mod session;
pub mod store;
pub mod types;
pub mod wire;
