//! Authentication primitives.
//!
//! - [`password`] -- Argon2id password hashing and verification.
//! - [`jwt`] -- JWT access-token generation and validation.
//! - [`directory`] -- the static set of accounts allowed to log in.

pub mod directory;
pub mod jwt;
pub mod password;
