//! Background bulk job dispatcher.
//!
//! Claims one pending job at a time through [`JobStore::claim_next_pending`]
//! and runs it to completion on the matching handler. Running jobs left over
//! from a previous process are requeued once at startup. A failure that
//! could not be written is retried before the next claim. Shutdown is only
//! observed between jobs, so a job that has started always finishes.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use ninja_core::types::DbId;
use tokio_util::sync::CancellationToken;

use crate::context::JobContext;
use crate::credentials::Credentials;
use crate::error::StoreError;
use crate::registry::HandlerRegistry;
use crate::runner::panic_message;
use crate::store::{JobStore, LeadStore};

/// Default sleep between empty polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// What a single dispatch step did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// No pending job was available.
    Idle,
    /// The job finished as `done`.
    Completed(DbId),
    /// The job finished as `failed`.
    Failed { job_id: DbId, error: String },
}

pub struct Dispatcher {
    jobs: Arc<dyn JobStore>,
    leads: Arc<dyn LeadStore>,
    credentials: Arc<dyn Credentials>,
    registry: Arc<HandlerRegistry>,
    poll_interval: Duration,
    /// Terminal `failed` write that hit a store error. Retried before the
    /// next claim so the job is not left in `running`.
    pending_failure: Mutex<Option<(DbId, String)>>,
}

impl Dispatcher {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        leads: Arc<dyn LeadStore>,
        credentials: Arc<dyn Credentials>,
        registry: Arc<HandlerRegistry>,
    ) -> Self {
        Self {
            jobs,
            leads,
            credentials,
            registry,
            poll_interval: DEFAULT_POLL_INTERVAL,
            pending_failure: Mutex::new(None),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Requeue jobs stranded in `running` by a previous process.
    ///
    /// Failure is logged and otherwise ignored.
    pub async fn recover_orphans(&self) -> u64 {
        match self.jobs.reset_running_to_pending().await {
            Ok(0) => 0,
            Ok(recovered) => {
                tracing::warn!(recovered, "Recovered orphaned running jobs back to pending");
                recovered
            }
            Err(e) => {
                tracing::warn!(error = %e, "Orphaned job recovery failed");
                0
            }
        }
    }

    /// Run the dispatcher loop until the cancellation token is triggered.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            poll_interval_secs = self.poll_interval.as_secs_f64(),
            job_types = ?self.registry.job_types(),
            "Bulk job dispatcher started",
        );

        self.recover_orphans().await;

        while !cancel.is_cancelled() {
            let pause = match self.dispatch_once().await {
                Ok(DispatchOutcome::Idle) => self.poll_interval,
                Ok(_) => Duration::ZERO,
                Err(e) => {
                    tracing::error!(error = %e, "Dispatch cycle failed");
                    self.poll_interval * 2
                }
            };

            if pause.is_zero() {
                continue;
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }

        tracing::info!("Bulk job dispatcher shutting down");
    }

    /// Claim and run at most one job.
    ///
    /// Handler errors and panics end up as a failed job, not as an `Err`;
    /// `Err` is reserved for store failures.
    pub async fn dispatch_once(&self) -> Result<DispatchOutcome, StoreError> {
        self.retry_pending_failure().await?;

        let Some(job) = self.jobs.claim_next_pending().await? else {
            return Ok(DispatchOutcome::Idle);
        };
        let job_id = job.id;
        let job_type = job.job_type.clone();

        tracing::info!(%job_id, job_type = %job_type, "Job claimed");

        let Some(handler) = self.registry.get(&job_type) else {
            let error = format!("Unknown job type: {job_type}");
            tracing::error!(%job_id, job_type = %job_type, "Unknown job type");
            self.mark_failed(job_id, &error).await?;
            return Ok(DispatchOutcome::Failed { job_id, error });
        };

        let ctx = JobContext::new(
            job,
            Arc::clone(&self.jobs),
            Arc::clone(&self.leads),
            Arc::clone(&self.credentials),
        );

        let started = std::time::Instant::now();
        let outcome = AssertUnwindSafe(handler.run(&ctx)).catch_unwind().await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let error = match outcome {
            Ok(Ok(())) if ctx.is_finished() => None,
            Ok(Ok(())) => Some("Handler returned without completing the job".to_string()),
            Ok(Err(e)) => Some(e.to_string()),
            Err(panic) => Some(format!("Handler panicked: {}", panic_message(panic.as_ref()))),
        };

        match error {
            None => {
                tracing::info!(%job_id, job_type = %job_type, elapsed_ms, "Job finished");
                Ok(finished_outcome(&ctx))
            }
            Some(error) if ctx.is_finished() => {
                tracing::warn!(
                    %job_id,
                    job_type = %job_type,
                    error = %error,
                    "Handler errored after finishing the job; keeping recorded status",
                );
                Ok(finished_outcome(&ctx))
            }
            Some(error) => {
                tracing::error!(%job_id, job_type = %job_type, elapsed_ms, error = %error, "Job failed");
                self.mark_failed(job_id, &error).await?;
                Ok(DispatchOutcome::Failed { job_id, error })
            }
        }
    }

    /// Write `failed` for a job, remembering the write if the store rejects it.
    async fn mark_failed(&self, job_id: DbId, error: &str) -> Result<(), StoreError> {
        if let Err(e) = self.jobs.mark_failed(job_id, error).await {
            tracing::warn!(%job_id, error = %e, "Could not record job failure; will retry");
            *self.pending_failure_slot() = Some((job_id, error.to_string()));
            return Err(e);
        }
        Ok(())
    }

    async fn retry_pending_failure(&self) -> Result<(), StoreError> {
        let pending = self.pending_failure_slot().take();
        let Some((job_id, error)) = pending else {
            return Ok(());
        };
        self.mark_failed(job_id, &error).await?;
        tracing::info!(%job_id, "Recorded deferred job failure");
        Ok(())
    }

    fn pending_failure_slot(&self) -> MutexGuard<'_, Option<(DbId, String)>> {
        self.pending_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Outcome of a job the handler already finished through its context.
fn finished_outcome(ctx: &JobContext) -> DispatchOutcome {
    match ctx.failure_message() {
        Some(error) => DispatchOutcome::Failed {
            job_id: ctx.job_id(),
            error: error.to_string(),
        },
        None => DispatchOutcome::Completed(ctx.job_id()),
    }
}
