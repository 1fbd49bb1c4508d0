#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ninja_core::enrichment::STAGE_WEBSITE_VALIDATED;
use ninja_core::progress::Progress;
use ninja_core::types::DbId;
use ninja_db::models::bulk_job::BulkJob;
use ninja_db::models::status::BulkJobStatus;
use ninja_worker::clients::contacts::ContactSource;
use ninja_worker::clients::openai::{DecisionMaker, DecisionMakerExtractor};
use ninja_worker::clients::pages::PageSource;
use ninja_worker::clients::ClientError;
use ninja_worker::context::JobContext;
use ninja_worker::credentials::{Credentials, StaticCredentials};
use ninja_worker::dispatcher::Dispatcher;
use ninja_worker::error::{HandlerError, HandlerResult, StoreError};
use ninja_worker::handlers::JobHandler;
use ninja_worker::registry::HandlerRegistry;
use ninja_worker::store::{JobStore, MemoryStore};
use serde_json::{json, Value};

// ---------------------------------------------------------------------------
// Dispatcher wiring
// ---------------------------------------------------------------------------

pub fn dispatcher(
    store: &Arc<MemoryStore>,
    registry: HandlerRegistry,
    credentials: impl Credentials + 'static,
) -> Dispatcher {
    Dispatcher::new(
        store.clone(),
        store.clone(),
        Arc::new(credentials),
        Arc::new(registry),
    )
    .with_poll_interval(Duration::from_millis(10))
}

pub fn both_keys() -> StaticCredentials {
    StaticCredentials::new()
        .with("openwebninja", "ninja-key")
        .with("openai", "sk-test")
}

/// Poll until the job reaches a terminal status or the deadline passes.
pub async fn wait_for_terminal(store: &MemoryStore, job_id: DbId) -> BulkJob {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let job = store.job(job_id).expect("job exists");
        if job.status().is_some_and(|s| s.is_terminal()) {
            return job;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "job {job_id} did not finish in time"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

pub fn assert_status(store: &MemoryStore, job_id: DbId, status: BulkJobStatus) -> BulkJob {
    let job = store.job(job_id).expect("job exists");
    assert_eq!(job.status(), Some(status), "job {job_id}: {job:?}");
    job
}

// ---------------------------------------------------------------------------
// Leads
// ---------------------------------------------------------------------------

pub fn validated_lead(store: &MemoryStore, campaign_id: DbId, website: &str) -> DbId {
    let website = website.to_string();
    store.add_lead(campaign_id, |lead| {
        lead.company_name = Some(format!("Company at {website}"));
        lead.company_website = Some(website);
        lead.enrichment_status
            .set(STAGE_WEBSITE_VALIDATED, Value::Bool(true));
    })
}

// ---------------------------------------------------------------------------
// Simple handlers
// ---------------------------------------------------------------------------

/// Completes with `{"ok": true}`.
pub struct CompletingHandler;

#[async_trait]
impl JobHandler for CompletingHandler {
    async fn run(&self, ctx: &JobContext) -> HandlerResult<()> {
        ctx.update_progress(&Progress::new(1, 1)).await?;
        ctx.complete(json!({"ok": true})).await
    }
}

/// Returns an error without touching the job.
pub struct ErroringHandler;

#[async_trait]
impl JobHandler for ErroringHandler {
    async fn run(&self, _ctx: &JobContext) -> HandlerResult<()> {
        Err(HandlerError::Other("kaboom".into()))
    }
}

pub struct PanickingHandler;

#[async_trait]
impl JobHandler for PanickingHandler {
    async fn run(&self, _ctx: &JobContext) -> HandlerResult<()> {
        panic!("handler blew up");
    }
}

/// Returns `Ok` without finishing the job.
pub struct ForgetfulHandler;

#[async_trait]
impl JobHandler for ForgetfulHandler {
    async fn run(&self, _ctx: &JobContext) -> HandlerResult<()> {
        Ok(())
    }
}

/// Completes, then errors.
pub struct CompleteThenErrorHandler;

#[async_trait]
impl JobHandler for CompleteThenErrorHandler {
    async fn run(&self, ctx: &JobContext) -> HandlerResult<()> {
        ctx.complete(json!({"processed": 0})).await?;
        Err(HandlerError::Other("late error".into()))
    }
}

// ---------------------------------------------------------------------------
// Flaky store
// ---------------------------------------------------------------------------

/// Delegates to a [`MemoryStore`] but fails the first `failures` claims
/// and the first `mark_failed_failures` failure writes.
pub struct FlakyStore {
    pub inner: Arc<MemoryStore>,
    remaining_failures: AtomicUsize,
    remaining_mark_failed_failures: AtomicUsize,
    pub claim_attempts: AtomicUsize,
    pub claim_times: Mutex<Vec<tokio::time::Instant>>,
}

impl FlakyStore {
    pub fn new(inner: Arc<MemoryStore>, failures: usize) -> Self {
        Self {
            inner,
            remaining_failures: AtomicUsize::new(failures),
            remaining_mark_failed_failures: AtomicUsize::new(0),
            claim_attempts: AtomicUsize::new(0),
            claim_times: Mutex::new(Vec::new()),
        }
    }

    pub fn with_mark_failed_failures(self, failures: usize) -> Self {
        self.remaining_mark_failed_failures
            .store(failures, Ordering::SeqCst);
        self
    }
}

fn take_failure(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl JobStore for FlakyStore {
    async fn claim_next_pending(&self) -> Result<Option<BulkJob>, StoreError> {
        self.claim_attempts.fetch_add(1, Ordering::SeqCst);
        self.claim_times
            .lock()
            .unwrap()
            .push(tokio::time::Instant::now());
        if take_failure(&self.remaining_failures) {
            return Err(StoreError::Unavailable("connection refused".into()));
        }
        self.inner.claim_next_pending().await
    }

    async fn update_progress(&self, job_id: DbId, progress: &Progress) -> Result<(), StoreError> {
        self.inner.update_progress(job_id, progress).await
    }

    async fn mark_done(&self, job_id: DbId, result: &Value) -> Result<(), StoreError> {
        self.inner.mark_done(job_id, result).await
    }

    async fn mark_failed(&self, job_id: DbId, message: &str) -> Result<(), StoreError> {
        if take_failure(&self.remaining_mark_failed_failures) {
            return Err(StoreError::Unavailable("blip".into()));
        }
        self.inner.mark_failed(job_id, message).await
    }

    async fn reset_running_to_pending(&self) -> Result<u64, StoreError> {
        self.inner.reset_running_to_pending().await
    }
}

// ---------------------------------------------------------------------------
// Fake external services
// ---------------------------------------------------------------------------

/// Contact scraper keyed by website. Websites listed in `failing` error out.
#[derive(Default)]
pub struct FakeContacts {
    pub records: HashMap<String, Value>,
    pub failing: Vec<String>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeContacts {
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ContactSource for FakeContacts {
    async fn scrape_contacts(
        &self,
        _api_key: &str,
        website: &str,
    ) -> Result<Option<Value>, ClientError> {
        self.calls.lock().unwrap().push(website.to_string());
        if self.failing.iter().any(|w| w == website) {
            return Err(ClientError::ApiError {
                status: 500,
                body: "scraper down".into(),
            });
        }
        Ok(self.records.get(website).cloned())
    }
}

/// Pages keyed by full URL.
#[derive(Default)]
pub struct FakePages {
    pub pages: HashMap<String, String>,
}

#[async_trait]
impl PageSource for FakePages {
    async fn fetch_text(&self, url: &str) -> Result<Option<String>, ClientError> {
        Ok(self.pages.get(url).cloned())
    }
}

/// Answers with a decision maker when the prompt mentions `marker`.
pub struct FakeExtractor {
    pub marker: String,
    pub answer: DecisionMaker,
    pub calls: AtomicUsize,
}

#[async_trait]
impl DecisionMakerExtractor for FakeExtractor {
    async fn extract(
        &self,
        _api_key: &str,
        content: &str,
    ) -> Result<Option<DecisionMaker>, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(content.contains(&self.marker).then(|| self.answer.clone()))
    }
}
