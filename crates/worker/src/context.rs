//! Execution context handed to every job handler.
//!
//! The context binds one claimed job to the stores and credentials. It is
//! the only way a handler reads its configuration, reports progress,
//! finishes the job, or touches leads.

use std::sync::{Arc, OnceLock};

use ninja_core::job_config::{parse_config, JobConfig};
use ninja_core::progress::Progress;
use ninja_core::types::DbId;
use ninja_db::models::bulk_job::BulkJob;
use ninja_db::models::lead::{Lead, LeadQuery, LeadUpdate};
use ninja_db::models::status::BulkJobStatus;

use crate::credentials::Credentials;
use crate::error::{HandlerError, HandlerResult};
use crate::store::{JobStore, LeadStore};

pub struct JobContext {
    job: BulkJob,
    jobs: Arc<dyn JobStore>,
    leads: Arc<dyn LeadStore>,
    credentials: Arc<dyn Credentials>,
    /// Set once the job reached a terminal state through this context.
    terminal: OnceLock<BulkJobStatus>,
    failure: OnceLock<String>,
}

impl JobContext {
    pub fn new(
        job: BulkJob,
        jobs: Arc<dyn JobStore>,
        leads: Arc<dyn LeadStore>,
        credentials: Arc<dyn Credentials>,
    ) -> Self {
        Self {
            job,
            jobs,
            leads,
            credentials,
            terminal: OnceLock::new(),
            failure: OnceLock::new(),
        }
    }

    // ---- read-only job data ----

    pub fn job(&self) -> &BulkJob {
        &self.job
    }

    pub fn job_id(&self) -> DbId {
        self.job.id
    }

    pub fn job_type(&self) -> &str {
        &self.job.job_type
    }

    pub fn campaign_id(&self) -> Option<DbId> {
        self.job.campaign_id
    }

    /// Parse the job's `config` into `T`, filling defaults and validating.
    pub fn config<T: JobConfig>(&self) -> HandlerResult<T> {
        parse_config(&self.job.config).map_err(|e| HandlerError::Config(e.to_string()))
    }

    /// API key for an external service.
    pub fn api_key(&self, service: &str) -> Option<String> {
        self.credentials.api_key(service)
    }

    // ---- leads ----

    pub async fn fetch_leads(&self, query: &LeadQuery) -> HandlerResult<Vec<Lead>> {
        Ok(self.leads.fetch_candidates(query).await?)
    }

    /// Apply a partial update to a lead, merging its `enrichment_status`.
    /// Empty updates are skipped.
    pub async fn update_record(&self, lead_id: DbId, update: &LeadUpdate) -> HandlerResult<()> {
        if update.is_empty() {
            return Ok(());
        }
        self.leads.update_lead(lead_id, update).await?;
        Ok(())
    }

    // ---- job lifecycle ----

    /// Overwrite the job's progress snapshot.
    pub async fn update_progress(&self, progress: &Progress) -> HandlerResult<()> {
        if self.warn_if_finished("update_progress") {
            return Ok(());
        }
        self.jobs.update_progress(self.job.id, progress).await?;
        Ok(())
    }

    /// Mark the job done with `result`. Must be the handler's last call.
    pub async fn complete(&self, result: serde_json::Value) -> HandlerResult<()> {
        if self.warn_if_finished("complete") {
            return Ok(());
        }
        self.jobs.mark_done(self.job.id, &result).await?;
        let _ = self.terminal.set(BulkJobStatus::Done);
        tracing::info!(job_id = %self.job.id, result = %result, "Job completed");
        Ok(())
    }

    /// Mark the job failed with a human-readable message.
    pub async fn fail(&self, message: &str) -> HandlerResult<()> {
        if self.warn_if_finished("fail") {
            return Ok(());
        }
        self.jobs.mark_failed(self.job.id, message).await?;
        let _ = self.terminal.set(BulkJobStatus::Failed);
        let _ = self.failure.set(message.to_string());
        tracing::warn!(job_id = %self.job.id, error = message, "Job failed");
        Ok(())
    }

    /// Terminal status reached through this context, if any.
    pub fn terminal_status(&self) -> Option<BulkJobStatus> {
        self.terminal.get().copied()
    }

    /// Message passed to [`fail`](Self::fail), if the job was failed here.
    pub fn failure_message(&self) -> Option<&str> {
        self.failure.get().map(String::as_str)
    }

    pub fn is_finished(&self) -> bool {
        self.terminal.get().is_some()
    }

    fn warn_if_finished(&self, operation: &'static str) -> bool {
        match self.terminal.get() {
            Some(status) => {
                tracing::warn!(
                    job_id = %self.job.id,
                    operation,
                    status = %status,
                    "Ignoring write to a job that already finished",
                );
                true
            }
            None => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
