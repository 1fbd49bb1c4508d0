//! Bulk job entity and DTOs.
//!
//! Maps to the `bulk_jobs` and `bulk_job_statuses` tables.

use ninja_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::status::{BulkJobStatus, StatusId};

/// A row from the `bulk_jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BulkJob {
    pub id: DbId,
    pub job_type: String,
    pub status_id: StatusId,
    pub campaign_id: Option<DbId>,
    pub config: serde_json::Value,
    pub progress: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl BulkJob {
    /// Decoded status, `None` if the row carries an unknown status id.
    pub fn status(&self) -> Option<BulkJobStatus> {
        BulkJobStatus::from_id(self.status_id)
    }
}

/// DTO for enqueuing a new pending job.
///
/// Jobs are normally created by the product UI; the worker only uses this
/// in tests and operational tooling.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBulkJob {
    pub job_type: String,
    pub campaign_id: Option<DbId>,
    pub config: Option<serde_json::Value>,
}
