//! In-process job and lead store for tests.
//!
//! All state sits behind one mutex, so a claim is a single critical section
//! and concurrent callers can never receive the same job. The lock is never
//! held across an `.await`.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use ninja_core::enrichment::EnrichmentStatus;
use ninja_core::progress::Progress;
use ninja_core::types::DbId;
use ninja_db::models::bulk_job::BulkJob;
use ninja_db::models::lead::{Lead, LeadQuery, LeadUpdate};
use ninja_db::models::status::BulkJobStatus;

use super::{JobStore, LeadStore};
use crate::error::StoreError;

#[derive(Default)]
struct State {
    /// Insertion order doubles as queue order.
    jobs: Vec<BulkJob>,
    leads: Vec<Lead>,
    /// Unbounded; every snapshot is kept so tests can inspect the sequence.
    progress_history: HashMap<DbId, Vec<Progress>>,
}

/// Mutex-guarded store implementing both [`JobStore`] and [`LeadStore`].
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue a pending job and return its id.
    pub fn enqueue(
        &self,
        job_type: &str,
        campaign_id: Option<DbId>,
        config: serde_json::Value,
    ) -> DbId {
        let now = Utc::now();
        let job = BulkJob {
            id: DbId::new_v4(),
            job_type: job_type.to_string(),
            status_id: BulkJobStatus::Pending.id(),
            campaign_id,
            config,
            progress: serde_json::json!({}),
            result: None,
            error: None,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        let id = job.id;
        self.lock().jobs.push(job);
        id
    }

    /// Insert a lead for `campaign_id`, letting the caller fill in fields.
    pub fn add_lead(&self, campaign_id: DbId, configure: impl FnOnce(&mut Lead)) -> DbId {
        let now = Utc::now();
        let mut lead = Lead {
            id: DbId::new_v4(),
            campaign_id,
            company_name: None,
            company_website: None,
            domain: None,
            email: None,
            emails: Vec::new(),
            phone: None,
            phones: Vec::new(),
            social_facebook: None,
            social_instagram: None,
            social_linkedin: None,
            social_twitter: None,
            decision_maker_name: None,
            decision_maker_title: None,
            decision_maker_linkedin: None,
            decision_maker_confidence: None,
            decision_maker_source: None,
            enrichment_status: EnrichmentStatus::new(),
            created_at: now,
            updated_at: now,
        };
        configure(&mut lead);
        let id = lead.id;
        self.lock().leads.push(lead);
        id
    }

    pub fn job(&self, id: DbId) -> Option<BulkJob> {
        self.lock().jobs.iter().find(|j| j.id == id).cloned()
    }

    pub fn jobs(&self) -> Vec<BulkJob> {
        self.lock().jobs.clone()
    }

    pub fn lead(&self, id: DbId) -> Option<Lead> {
        self.lock().leads.iter().find(|l| l.id == id).cloned()
    }

    /// Every progress snapshot written for `job_id`, oldest first.
    pub fn progress_history(&self, job_id: DbId) -> Vec<Progress> {
        self.lock()
            .progress_history
            .get(&job_id)
            .cloned()
            .unwrap_or_default()
    }

    fn with_job<T>(
        &self,
        job_id: DbId,
        f: impl FnOnce(&mut BulkJob) -> T,
    ) -> Result<T, StoreError> {
        let mut state = self.lock();
        let job = state
            .jobs
            .iter_mut()
            .find(|j| j.id == job_id)
            .ok_or(StoreError::NotFound {
                entity: "BulkJob",
                id: job_id,
            })?;
        let out = f(job);
        job.updated_at = Utc::now();
        Ok(out)
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn claim_next_pending(&self) -> Result<Option<BulkJob>, StoreError> {
        let mut state = self.lock();
        let pending = BulkJobStatus::Pending.id();
        let Some(job) = state.jobs.iter_mut().find(|j| j.status_id == pending) else {
            return Ok(None);
        };
        let now = Utc::now();
        job.status_id = BulkJobStatus::Running.id();
        job.started_at = Some(now);
        job.updated_at = now;
        Ok(Some(job.clone()))
    }

    async fn update_progress(&self, job_id: DbId, progress: &Progress) -> Result<(), StoreError> {
        self.with_job(job_id, |job| job.progress = progress.to_json())?;
        self.lock()
            .progress_history
            .entry(job_id)
            .or_default()
            .push(progress.clone());
        Ok(())
    }

    async fn mark_done(&self, job_id: DbId, result: &serde_json::Value) -> Result<(), StoreError> {
        self.with_job(job_id, |job| {
            job.status_id = BulkJobStatus::Done.id();
            job.result = Some(result.clone());
            job.started_at = None;
            job.completed_at = Some(Utc::now());
        })
    }

    async fn mark_failed(&self, job_id: DbId, message: &str) -> Result<(), StoreError> {
        self.with_job(job_id, |job| {
            job.status_id = BulkJobStatus::Failed.id();
            job.error = Some(message.to_string());
            job.started_at = None;
            job.completed_at = Some(Utc::now());
        })
    }

    async fn reset_running_to_pending(&self) -> Result<u64, StoreError> {
        let mut state = self.lock();
        let running = BulkJobStatus::Running.id();
        let now = Utc::now();
        let mut recovered = 0;
        for job in state.jobs.iter_mut().filter(|j| j.status_id == running) {
            job.status_id = BulkJobStatus::Pending.id();
            job.started_at = None;
            job.progress = serde_json::json!({});
            job.updated_at = now;
            recovered += 1;
        }
        Ok(recovered)
    }
}

#[async_trait]
impl LeadStore for MemoryStore {
    async fn fetch_candidates(&self, query: &LeadQuery) -> Result<Vec<Lead>, StoreError> {
        let limit = usize::try_from(query.limit.max(0)).unwrap_or(usize::MAX);
        Ok(self
            .lock()
            .leads
            .iter()
            .filter(|lead| query.matches(lead))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn update_lead(&self, lead_id: DbId, update: &LeadUpdate) -> Result<(), StoreError> {
        let mut state = self.lock();
        let lead = state
            .leads
            .iter_mut()
            .find(|l| l.id == lead_id)
            .ok_or(StoreError::NotFound {
                entity: "Lead",
                id: lead_id,
            })?;
        update.apply_to(lead);
        lead.updated_at = Utc::now();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;
    use ninja_core::enrichment::OUTCOME_DONE;
    use serde_json::json;

    #[tokio::test]
    async fn claim_is_fifo_and_sets_started_at() {
        let store = MemoryStore::new();
        let first = store.enqueue("a", None, json!({}));
        let second = store.enqueue("b", None, json!({}));

        let claimed = store.claim_next_pending().await.unwrap().unwrap();
        assert_eq!(claimed.id, first);
        assert_eq!(claimed.status(), Some(BulkJobStatus::Running));
        assert!(claimed.started_at.is_some());

        let claimed = store.claim_next_pending().await.unwrap().unwrap();
        assert_eq!(claimed.id, second);

        assert!(store.claim_next_pending().await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_claims_are_mutually_exclusive() {
        let store = Arc::new(MemoryStore::new());
        for i in 0..20 {
            store.enqueue(&format!("job_{i}"), None, json!({}));
        }

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let mut mine = Vec::new();
                while let Some(job) = store.claim_next_pending().await.unwrap() {
                    mine.push(job.id);
                    tokio::task::yield_now().await;
                }
                mine
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }
        let unique: HashSet<_> = all.iter().collect();
        assert_eq!(all.len(), 20);
        assert_eq!(unique.len(), 20);
    }

    #[tokio::test]
    async fn reset_running_to_pending_clears_started_at_and_progress() {
        let store = MemoryStore::new();
        let running = store.enqueue("a", None, json!({}));
        let done = store.enqueue("b", None, json!({}));
        store.claim_next_pending().await.unwrap();
        store.claim_next_pending().await.unwrap();
        store
            .update_progress(running, &Progress::new(3, 10))
            .await
            .unwrap();
        store.mark_done(done, &json!({"processed": 0})).await.unwrap();

        assert_eq!(store.reset_running_to_pending().await.unwrap(), 1);

        let job = store.job(running).unwrap();
        assert_eq!(job.status(), Some(BulkJobStatus::Pending));
        assert!(job.started_at.is_none());
        assert_eq!(job.progress, json!({}));
        assert_eq!(store.job(done).unwrap().status(), Some(BulkJobStatus::Done));
    }

    #[tokio::test]
    async fn terminal_writes_clear_started_at() {
        let store = MemoryStore::new();
        let id = store.enqueue("a", None, json!({}));
        store.claim_next_pending().await.unwrap();
        store.mark_failed(id, "boom").await.unwrap();

        let job = store.job(id).unwrap();
        assert_eq!(job.status(), Some(BulkJobStatus::Failed));
        assert_eq!(job.error.as_deref(), Some("boom"));
        assert!(job.started_at.is_none());
        assert!(job.completed_at.is_some());
    }

    #[tokio::test]
    async fn unknown_job_is_not_found() {
        let store = MemoryStore::new();
        let err = store.mark_done(DbId::new_v4(), &json!({})).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "BulkJob", .. }));
    }

    #[tokio::test]
    async fn update_lead_merges_status() {
        let store = MemoryStore::new();
        let campaign = DbId::new_v4();
        let id = store.add_lead(campaign, |l| {
            l.enrichment_status.set_outcome("stage_a", OUTCOME_DONE);
        });

        store
            .update_lead(id, &LeadUpdate::stage_outcome("stage_b", OUTCOME_DONE))
            .await
            .unwrap();

        assert_eq!(
            store.lead(id).unwrap().enrichment_status.to_json(),
            json!({"stage_a": "done", "stage_b": "done"})
        );
    }
}
