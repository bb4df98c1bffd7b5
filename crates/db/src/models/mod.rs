//! Row structs mapped from the database.

pub mod session_record;
