//! Integration tests for the bulk job queue against a real database.
//!
//! Exercises:
//! - Atomic claim under concurrent callers
//! - Orphan recovery (`running -> pending`)
//! - Terminal transitions and progress overwrite
//!
//! Requires `DATABASE_URL` pointing at a Postgres server.

use std::collections::HashSet;

use ninja_db::models::bulk_job::CreateBulkJob;
use ninja_db::models::status::BulkJobStatus;
use ninja_db::repositories::BulkJobRepo;
use serde_json::json;
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn new_job(job_type: &str) -> CreateBulkJob {
    CreateBulkJob {
        job_type: job_type.to_string(),
        campaign_id: None,
        config: Some(json!({"max_leads": 10})),
    }
}

// ---------------------------------------------------------------------------
// Claim
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_claim_flips_to_running_and_sets_started_at(pool: PgPool) {
    let created = BulkJobRepo::create(&pool, &new_job("find_emails")).await.unwrap();
    assert_eq!(created.status(), Some(BulkJobStatus::Pending));
    assert!(created.started_at.is_none());

    let claimed = BulkJobRepo::claim_next(&pool).await.unwrap().unwrap();
    assert_eq!(claimed.id, created.id);
    assert_eq!(claimed.status(), Some(BulkJobStatus::Running));
    assert!(claimed.started_at.is_some());
    assert_eq!(claimed.config["max_leads"], 10);

    assert!(BulkJobRepo::claim_next(&pool).await.unwrap().is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_claim_returns_oldest_first(pool: PgPool) {
    let first = BulkJobRepo::create(&pool, &new_job("a")).await.unwrap();
    let second = BulkJobRepo::create(&pool, &new_job("b")).await.unwrap();

    let c1 = BulkJobRepo::claim_next(&pool).await.unwrap().unwrap();
    let c2 = BulkJobRepo::claim_next(&pool).await.unwrap().unwrap();
    assert_eq!(c1.id, first.id);
    assert_eq!(c2.id, second.id);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_concurrent_claims_never_return_same_job(pool: PgPool) {
    const JOBS: usize = 8;
    const CLAIMERS: usize = 16;

    for i in 0..JOBS {
        BulkJobRepo::create(&pool, &new_job(&format!("job_{i}"))).await.unwrap();
    }

    let mut handles = Vec::new();
    for _ in 0..CLAIMERS {
        let pool = pool.clone();
        handles.push(tokio::spawn(async move {
            BulkJobRepo::claim_next(&pool).await.unwrap()
        }));
    }

    let mut claimed = Vec::new();
    for handle in handles {
        if let Some(job) = handle.await.unwrap() {
            claimed.push(job.id);
        }
    }

    let unique: HashSet<_> = claimed.iter().collect();
    assert_eq!(unique.len(), claimed.len(), "a job was claimed twice");
    assert_eq!(claimed.len(), JOBS);
}

// ---------------------------------------------------------------------------
// Recovery
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_reset_running_to_pending(pool: PgPool) {
    let running = BulkJobRepo::create(&pool, &new_job("find_emails")).await.unwrap();
    BulkJobRepo::claim_next(&pool).await.unwrap().unwrap();
    BulkJobRepo::update_progress(&pool, running.id, &json!({"processed": 4, "total": 9}))
        .await
        .unwrap();

    let done = BulkJobRepo::create(&pool, &new_job("find_emails")).await.unwrap();
    BulkJobRepo::claim_next(&pool).await.unwrap().unwrap();
    BulkJobRepo::complete(&pool, done.id, &json!({"processed": 0})).await.unwrap();

    let recovered = BulkJobRepo::reset_running_to_pending(&pool).await.unwrap();
    assert_eq!(recovered, 1);

    let job = BulkJobRepo::find_by_id(&pool, running.id).await.unwrap().unwrap();
    assert_eq!(job.status(), Some(BulkJobStatus::Pending));
    assert!(job.started_at.is_none());
    assert_eq!(job.progress, json!({}));

    let job = BulkJobRepo::find_by_id(&pool, done.id).await.unwrap().unwrap();
    assert_eq!(job.status(), Some(BulkJobStatus::Done));
}

// ---------------------------------------------------------------------------
// Terminal transitions
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_complete_and_fail(pool: PgPool) {
    let a = BulkJobRepo::create(&pool, &new_job("a")).await.unwrap();
    let b = BulkJobRepo::create(&pool, &new_job("b")).await.unwrap();
    BulkJobRepo::claim_next(&pool).await.unwrap();
    BulkJobRepo::claim_next(&pool).await.unwrap();

    BulkJobRepo::complete(&pool, a.id, &json!({"processed": 3, "enriched": 2}))
        .await
        .unwrap();
    BulkJobRepo::fail(&pool, b.id, "OpenAI API key not configured").await.unwrap();

    let a = BulkJobRepo::find_by_id(&pool, a.id).await.unwrap().unwrap();
    assert_eq!(a.status(), Some(BulkJobStatus::Done));
    assert_eq!(a.result, Some(json!({"processed": 3, "enriched": 2})));
    assert!(a.started_at.is_none());
    assert!(a.completed_at.is_some());

    let b = BulkJobRepo::find_by_id(&pool, b.id).await.unwrap().unwrap();
    assert_eq!(b.status(), Some(BulkJobStatus::Failed));
    assert_eq!(b.error.as_deref(), Some("OpenAI API key not configured"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_progress_is_overwritten_not_merged(pool: PgPool) {
    let job = BulkJobRepo::create(&pool, &new_job("a")).await.unwrap();
    BulkJobRepo::claim_next(&pool).await.unwrap();

    BulkJobRepo::update_progress(&pool, job.id, &json!({"processed": 1, "total": 2, "found": 1}))
        .await
        .unwrap();
    BulkJobRepo::update_progress(&pool, job.id, &json!({"processed": 2, "total": 2}))
        .await
        .unwrap();

    let job = BulkJobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(job.progress, json!({"processed": 2, "total": 2}));
}
