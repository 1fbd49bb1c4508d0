//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods
//! that accept `&PgPool` as the first argument.

pub mod bulk_job_repo;
pub mod lead_repo;

pub use bulk_job_repo::BulkJobRepo;
pub use lead_repo::LeadRepo;
