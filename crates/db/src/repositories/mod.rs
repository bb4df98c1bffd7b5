//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod session_record_repo;

pub use session_record_repo::SessionRecordRepo;
