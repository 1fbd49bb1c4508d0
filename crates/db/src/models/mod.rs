//! Domain model structs and DTOs.
//!
//! Each submodule contains a `FromRow` + `Serialize` entity struct matching
//! the database row, plus the DTOs used to query or patch it.

pub mod bulk_job;
pub mod lead;
pub mod status;
