//! Store seams used by the dispatcher and handlers.
//!
//! [`JobStore`] covers the bulk job queue, [`LeadStore`] the records that
//! handlers enrich. Both are passed around as explicit `Arc<dyn ...>`
//! handles; there is no process-wide client.
//!
//! - [`PgStore`] delegates to the `ninja_db` repositories.
//! - [`memory::MemoryStore`] keeps everything in process. It records every
//!   progress write and is meant for tests only.

pub mod memory;

use async_trait::async_trait;
use ninja_core::progress::Progress;
use ninja_core::types::DbId;
use ninja_db::models::bulk_job::BulkJob;
use ninja_db::models::lead::{Lead, LeadQuery, LeadUpdate};
use ninja_db::repositories::{BulkJobRepo, LeadRepo};
use ninja_db::DbPool;

use crate::error::StoreError;

pub use memory::MemoryStore;

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Persistence for bulk job records.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Atomically move the oldest pending job to running and return it.
    ///
    /// Implementations must guarantee that concurrent callers never receive
    /// the same job. Returns `None` when the queue is empty.
    async fn claim_next_pending(&self) -> Result<Option<BulkJob>, StoreError>;

    /// Overwrite the job's progress snapshot.
    async fn update_progress(&self, job_id: DbId, progress: &Progress) -> Result<(), StoreError>;

    /// Terminal transition to done.
    async fn mark_done(&self, job_id: DbId, result: &serde_json::Value) -> Result<(), StoreError>;

    /// Terminal transition to failed, from any prior status.
    async fn mark_failed(&self, job_id: DbId, message: &str) -> Result<(), StoreError>;

    /// Requeue every running job, clearing `started_at` and `progress`.
    /// Returns the number of jobs recovered.
    async fn reset_running_to_pending(&self) -> Result<u64, StoreError>;
}

/// Read/patch access to leads.
#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Fetch a batch of candidates; every filter is applied before the limit.
    async fn fetch_candidates(&self, query: &LeadQuery) -> Result<Vec<Lead>, StoreError>;

    /// Apply a partial update, merging `enrichment_status`.
    async fn update_lead(&self, lead_id: DbId, update: &LeadUpdate) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// PgStore
// ---------------------------------------------------------------------------

/// Postgres-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgStore {
    async fn claim_next_pending(&self) -> Result<Option<BulkJob>, StoreError> {
        Ok(BulkJobRepo::claim_next(&self.pool).await?)
    }

    async fn update_progress(&self, job_id: DbId, progress: &Progress) -> Result<(), StoreError> {
        Ok(BulkJobRepo::update_progress(&self.pool, job_id, &progress.to_json()).await?)
    }

    async fn mark_done(&self, job_id: DbId, result: &serde_json::Value) -> Result<(), StoreError> {
        Ok(BulkJobRepo::complete(&self.pool, job_id, result).await?)
    }

    async fn mark_failed(&self, job_id: DbId, message: &str) -> Result<(), StoreError> {
        Ok(BulkJobRepo::fail(&self.pool, job_id, message).await?)
    }

    async fn reset_running_to_pending(&self) -> Result<u64, StoreError> {
        Ok(BulkJobRepo::reset_running_to_pending(&self.pool).await?)
    }
}

#[async_trait]
impl LeadStore for PgStore {
    async fn fetch_candidates(&self, query: &LeadQuery) -> Result<Vec<Lead>, StoreError> {
        Ok(LeadRepo::find_candidates(&self.pool, query).await?)
    }

    async fn update_lead(&self, lead_id: DbId, update: &LeadUpdate) -> Result<(), StoreError> {
        if LeadRepo::update(&self.pool, lead_id, update).await? {
            Ok(())
        } else {
            Err(StoreError::NotFound {
                entity: "Lead",
                id: lead_id,
            })
        }
    }
}
