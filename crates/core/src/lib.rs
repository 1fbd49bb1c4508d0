//! Pure domain types shared by the database layer and the worker.
//!
//! Nothing in this crate performs I/O. It holds the vocabulary the rest of
//! the workspace speaks: identifiers, the enrichment-status map and its
//! merge rules, job progress snapshots, and typed job configuration.

pub mod enrichment;
pub mod error;
pub mod job_config;
pub mod progress;
pub mod types;
