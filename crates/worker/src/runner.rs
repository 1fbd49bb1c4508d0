//! Bounded-concurrency enrichment of a batch of leads.
//!
//! The runner keeps at most `concurrency` per-lead operations in flight on a
//! [`JoinSet`]. Each operation runs in its own task under a timeout and a
//! panic guard, so one bad lead never takes down its siblings or the job.
//! Lead updates are applied from the collecting loop as results arrive, and
//! progress is flushed at the start, every `flush_every` completions, and
//! once more with the final totals.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use ninja_core::progress::Progress;
use ninja_core::types::DbId;
use ninja_db::models::lead::{Lead, LeadUpdate};
use tokio::task::JoinSet;

use crate::context::JobContext;
use crate::error::HandlerResult;

pub const DEFAULT_CONCURRENCY: usize = 5;
pub const DEFAULT_FLUSH_EVERY: u64 = 10;
pub const DEFAULT_RECORD_TIMEOUT: Duration = Duration::from_secs(60);

/// What a per-lead operation produced.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    /// The lead was enriched; the update is applied and counted as a hit.
    Hit(LeadUpdate),
    /// Nothing found. An optional update (e.g. a `not_found` marker) is
    /// still applied, but the lead does not count as a hit.
    Miss(Option<LeadUpdate>),
}

/// Final counts for one runner pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub total: u64,
    pub processed: u64,
    pub hits: u64,
    pub failed: u64,
    hit_counter: &'static str,
}

impl RunSummary {
    fn new(total: u64, hit_counter: &'static str) -> Self {
        Self {
            total,
            processed: 0,
            hits: 0,
            failed: 0,
            hit_counter,
        }
    }

    /// Progress snapshot: `{"processed", "total", <hit_counter>}`.
    pub fn progress(&self) -> Progress {
        Progress::new(self.processed, self.total).with_counter(self.hit_counter, self.hits)
    }

    /// Job result payload: `{"processed", <hit_counter>, "total"}`.
    pub fn to_result(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert("processed".into(), self.processed.into());
        map.insert(self.hit_counter.into(), self.hits.into());
        map.insert("total".into(), self.total.into());
        serde_json::Value::Object(map)
    }
}

/// How a single lead ended up.
enum Settled {
    Hit,
    Miss,
    Failed,
}

pub struct EnrichmentRunner {
    hit_counter: &'static str,
    concurrency: usize,
    flush_every: u64,
    record_timeout: Duration,
}

impl EnrichmentRunner {
    /// `hit_counter` names the extra progress/result counter, e.g.
    /// `"enriched"` or `"found"`.
    pub fn new(hit_counter: &'static str) -> Self {
        Self {
            hit_counter,
            concurrency: DEFAULT_CONCURRENCY,
            flush_every: DEFAULT_FLUSH_EVERY,
            record_timeout: DEFAULT_RECORD_TIMEOUT,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_flush_every(mut self, flush_every: u64) -> Self {
        self.flush_every = flush_every.max(1);
        self
    }

    pub fn with_record_timeout(mut self, timeout: Duration) -> Self {
        self.record_timeout = timeout;
        self
    }

    /// Run `op` over every lead and return the final counts.
    ///
    /// Only progress writes propagate errors; everything that goes wrong for
    /// an individual lead is logged and counted in `failed`.
    pub async fn run<F, Fut>(
        &self,
        ctx: &JobContext,
        leads: Vec<Lead>,
        op: F,
    ) -> HandlerResult<RunSummary>
    where
        F: Fn(Lead) -> Fut,
        Fut: Future<Output = HandlerResult<RecordOutcome>> + Send + 'static,
    {
        let mut summary = RunSummary::new(leads.len() as u64, self.hit_counter);
        ctx.update_progress(&summary.progress()).await?;

        let mut queue = leads.into_iter();
        let mut tasks = JoinSet::new();

        loop {
            while tasks.len() < self.concurrency {
                let Some(lead) = queue.next() else { break };
                let lead_id = lead.id;
                let name = lead.display_name().to_string();
                let guarded = AssertUnwindSafe(tokio::time::timeout(self.record_timeout, op(lead)))
                    .catch_unwind();
                tasks.spawn(async move { (lead_id, name, guarded.await) });
            }

            let Some(joined) = tasks.join_next().await else {
                break;
            };
            summary.processed += 1;

            let settled = match joined {
                Ok((lead_id, name, Ok(Ok(Ok(outcome))))) => {
                    self.apply(ctx, lead_id, &name, outcome).await
                }
                Ok((lead_id, name, Ok(Ok(Err(e))))) => {
                    tracing::warn!(job_id = %ctx.job_id(), %lead_id, lead = %name, error = %e, "Error enriching lead");
                    Settled::Failed
                }
                Ok((lead_id, name, Ok(Err(_elapsed)))) => {
                    tracing::warn!(
                        job_id = %ctx.job_id(),
                        %lead_id,
                        lead = %name,
                        timeout_secs = self.record_timeout.as_secs(),
                        "Enriching lead timed out",
                    );
                    Settled::Failed
                }
                Ok((lead_id, name, Err(panic))) => {
                    tracing::error!(
                        job_id = %ctx.job_id(),
                        %lead_id,
                        lead = %name,
                        panic = %panic_message(panic.as_ref()),
                        "Enriching lead panicked",
                    );
                    Settled::Failed
                }
                Err(e) => {
                    tracing::error!(job_id = %ctx.job_id(), error = %e, "Enrichment task aborted");
                    Settled::Failed
                }
            };

            match settled {
                Settled::Hit => summary.hits += 1,
                Settled::Miss => {}
                Settled::Failed => summary.failed += 1,
            }

            if summary.processed % self.flush_every == 0 {
                ctx.update_progress(&summary.progress()).await?;
            }
        }

        ctx.update_progress(&summary.progress()).await?;
        tracing::info!(
            job_id = %ctx.job_id(),
            processed = summary.processed,
            hits = summary.hits,
            failed = summary.failed,
            total = summary.total,
            "Enrichment pass finished",
        );
        Ok(summary)
    }

    async fn apply(
        &self,
        ctx: &JobContext,
        lead_id: DbId,
        name: &str,
        outcome: RecordOutcome,
    ) -> Settled {
        let (update, hit) = match outcome {
            RecordOutcome::Hit(update) => (Some(update), true),
            RecordOutcome::Miss(update) => (update, false),
        };
        if let Some(update) = update {
            if let Err(e) = ctx.update_record(lead_id, &update).await {
                tracing::warn!(job_id = %ctx.job_id(), %lead_id, lead = name, error = %e, "Failed to update lead");
                return Settled::Failed;
            }
        }
        if hit {
            Settled::Hit
        } else {
            Settled::Miss
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
