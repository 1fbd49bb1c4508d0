//! Repository for the `bulk_jobs` table.
//!
//! Uses `BulkJobStatus` from `models::status` for all status transitions.
//! The claim itself lives server-side in `claim_next_bulk_job()`.

use ninja_core::types::DbId;
use sqlx::PgPool;

use crate::models::bulk_job::{BulkJob, CreateBulkJob};
use crate::models::status::BulkJobStatus;

/// Column list for `bulk_jobs` queries.
const COLUMNS: &str = "\
    id, job_type, status_id, campaign_id, config, progress, result, error, \
    started_at, completed_at, created_at, updated_at";

/// Provides queue operations for bulk jobs.
pub struct BulkJobRepo;

impl BulkJobRepo {
    /// Enqueue a new pending job.
    pub async fn create(pool: &PgPool, input: &CreateBulkJob) -> Result<BulkJob, sqlx::Error> {
        let query = format!(
            "INSERT INTO bulk_jobs (job_type, status_id, campaign_id, config) \
             VALUES ($1, $2, $3, COALESCE($4, '{{}}'::jsonb)) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, BulkJob>(&query)
            .bind(&input.job_type)
            .bind(BulkJobStatus::Pending.id())
            .bind(input.campaign_id)
            .bind(&input.config)
            .fetch_one(pool)
            .await
    }

    /// Atomically claim the oldest pending job.
    ///
    /// Delegates to the `claim_next_bulk_job()` SQL function, which flips the
    /// row to running inside a single `UPDATE ... FOR UPDATE SKIP LOCKED`
    /// statement, so concurrent callers never receive the same job.
    pub async fn claim_next(pool: &PgPool) -> Result<Option<BulkJob>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM claim_next_bulk_job()");
        sqlx::query_as::<_, BulkJob>(&query)
            .fetch_optional(pool)
            .await
    }

    /// Overwrite the job's progress snapshot.
    pub async fn update_progress(
        pool: &PgPool,
        job_id: DbId,
        progress: &serde_json::Value,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE bulk_jobs SET progress = $2, updated_at = NOW() WHERE id = $1")
            .bind(job_id)
            .bind(progress)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Mark a job as done with its result payload.
    pub async fn complete(
        pool: &PgPool,
        job_id: DbId,
        result: &serde_json::Value,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE bulk_jobs \
             SET status_id = $2, result = $3, started_at = NULL, \
                 completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(job_id)
        .bind(BulkJobStatus::Done.id())
        .bind(result)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Mark a job as failed with an error message, from any prior status.
    ///
    /// No automatic retry is performed; a failed job stays failed.
    pub async fn fail(pool: &PgPool, job_id: DbId, error: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE bulk_jobs \
             SET status_id = $2, error = $3, started_at = NULL, \
                 completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(job_id)
        .bind(BulkJobStatus::Failed.id())
        .bind(error)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Requeue every running job, clearing `started_at` and `progress`.
    ///
    /// Returns the number of jobs recovered. Only safe while no other worker
    /// is running; see [`crate::lock`].
    pub async fn reset_running_to_pending(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE bulk_jobs \
             SET status_id = $1, started_at = NULL, progress = '{}'::jsonb, \
                 updated_at = NOW() \
             WHERE status_id = $2",
        )
        .bind(BulkJobStatus::Pending.id())
        .bind(BulkJobStatus::Running.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Find a job by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<BulkJob>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM bulk_jobs WHERE id = $1");
        sqlx::query_as::<_, BulkJob>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
