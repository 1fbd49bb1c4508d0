//! Integration tests for lead candidate selection and partial updates.
//!
//! Requires `DATABASE_URL` pointing at a Postgres server.

use ninja_core::enrichment::{EnrichmentStatus, OUTCOME_DONE};
use ninja_core::types::DbId;
use ninja_db::models::lead::{LeadField, LeadQuery, LeadUpdate};
use ninja_db::repositories::LeadRepo;
use serde_json::json;
use sqlx::PgPool;

async fn insert_lead(
    pool: &PgPool,
    campaign_id: DbId,
    email: Option<&str>,
    status: serde_json::Value,
) -> DbId {
    sqlx::query_scalar(
        "INSERT INTO leads (campaign_id, company_name, company_website, email, enrichment_status) \
         VALUES ($1, 'Acme', 'acme.com', $2, $3) RETURNING id",
    )
    .bind(campaign_id)
    .bind(email)
    .bind(status)
    .fetch_one(pool)
    .await
    .unwrap()
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_find_candidates_filters_before_limit(pool: PgPool) {
    let campaign = DbId::new_v4();
    // Ineligible rows inserted first so a post-limit filter would miss eligible ones.
    insert_lead(&pool, campaign, Some("a@b.c"), json!({"website_validated": true})).await;
    insert_lead(&pool, campaign, None, json!({})).await;
    for _ in 0..5 {
        insert_lead(&pool, campaign, None, json!({"website_validated": true})).await;
    }
    insert_lead(&pool, DbId::new_v4(), None, json!({"website_validated": true})).await;

    let query = LeadQuery {
        campaign_id: campaign,
        limit: 3,
        missing: Some(LeadField::Email),
        validated_only: true,
    };
    let leads = LeadRepo::find_candidates(&pool, &query).await.unwrap();
    assert_eq!(leads.len(), 3);
    assert!(leads.iter().all(|l| query.matches(l)));

    let all = LeadRepo::find_candidates(
        &pool,
        &LeadQuery {
            campaign_id: campaign,
            limit: 100,
            missing: None,
            validated_only: false,
        },
    )
    .await
    .unwrap();
    assert_eq!(all.len(), 7);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_update_merges_enrichment_status(pool: PgPool) {
    let id = insert_lead(&pool, DbId::new_v4(), None, json!({"stage_a": "done"})).await;

    let update = LeadUpdate {
        email: Some("owner@acme.com".into()),
        enrichment_status: EnrichmentStatus::new().with_outcome("stage_b", OUTCOME_DONE),
        ..LeadUpdate::default()
    };
    assert!(LeadRepo::update(&pool, id, &update).await.unwrap());

    let lead = LeadRepo::find_by_id(&pool, id).await.unwrap().unwrap();
    assert_eq!(lead.email.as_deref(), Some("owner@acme.com"));
    assert_eq!(lead.company_website.as_deref(), Some("acme.com"));
    assert_eq!(
        lead.enrichment_status.to_json(),
        json!({"stage_a": "done", "stage_b": "done"})
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_update_unknown_lead_returns_false(pool: PgPool) {
    let updated = LeadRepo::update(&pool, DbId::new_v4(), &LeadUpdate::default())
        .await
        .unwrap();
    assert!(!updated);
}
