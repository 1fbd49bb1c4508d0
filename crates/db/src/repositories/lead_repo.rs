//! Repository for the `leads` table.

use ninja_core::types::DbId;
use sqlx::PgPool;

use crate::models::lead::{Lead, LeadQuery, LeadUpdate};

/// Column list for `leads` queries.
const COLUMNS: &str = "\
    id, campaign_id, company_name, company_website, domain, \
    email, emails, phone, phones, \
    social_facebook, social_instagram, social_linkedin, social_twitter, \
    decision_maker_name, decision_maker_title, decision_maker_linkedin, \
    decision_maker_confidence, decision_maker_source, \
    enrichment_status, created_at, updated_at";

/// Provides candidate selection and partial updates for leads.
pub struct LeadRepo;

impl LeadRepo {
    /// Fetch up to `query.limit` leads matching every filter in `query`.
    ///
    /// All predicates run in SQL so the limit only counts eligible rows.
    pub async fn find_candidates(pool: &PgPool, query: &LeadQuery) -> Result<Vec<Lead>, sqlx::Error> {
        let mut conditions: Vec<String> = vec!["campaign_id = $1".to_string()];
        let mut bind_idx: u32 = 2;

        if let Some(field) = query.missing {
            conditions.push(format!("{} IS NULL", field.column()));
        }

        if query.validated_only {
            conditions.push(format!("enrichment_status @> ${bind_idx}"));
            bind_idx += 1;
        }

        let sql = format!(
            "SELECT {COLUMNS} FROM leads \
             WHERE {} \
             ORDER BY created_at ASC, id ASC \
             LIMIT ${bind_idx}",
            conditions.join(" AND "),
        );

        let mut q = sqlx::query_as::<_, Lead>(&sql).bind(query.campaign_id);
        if query.validated_only {
            q = q.bind(LeadQuery::validated_filter());
        }
        q.bind(query.limit).fetch_all(pool).await
    }

    /// Apply a partial update.
    ///
    /// `None` fields keep their stored value. `enrichment_status` is merged
    /// with `||`, a shallow key-wise union where the incoming keys win, so
    /// outcomes recorded by other stages survive. Returns `false` if no lead
    /// has that id.
    pub async fn update(pool: &PgPool, id: DbId, input: &LeadUpdate) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE leads SET
                email = COALESCE($2, email),
                emails = COALESCE($3, emails),
                phone = COALESCE($4, phone),
                phones = COALESCE($5, phones),
                social_facebook = COALESCE($6, social_facebook),
                social_instagram = COALESCE($7, social_instagram),
                social_linkedin = COALESCE($8, social_linkedin),
                social_twitter = COALESCE($9, social_twitter),
                decision_maker_name = COALESCE($10, decision_maker_name),
                decision_maker_title = COALESCE($11, decision_maker_title),
                decision_maker_linkedin = COALESCE($12, decision_maker_linkedin),
                decision_maker_confidence = COALESCE($13, decision_maker_confidence),
                decision_maker_source = COALESCE($14, decision_maker_source),
                enrichment_status = COALESCE(enrichment_status, '{}'::jsonb) || $15,
                updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(&input.email)
        .bind(&input.emails)
        .bind(&input.phone)
        .bind(&input.phones)
        .bind(&input.social_facebook)
        .bind(&input.social_instagram)
        .bind(&input.social_linkedin)
        .bind(&input.social_twitter)
        .bind(&input.decision_maker_name)
        .bind(&input.decision_maker_title)
        .bind(&input.decision_maker_linkedin)
        .bind(&input.decision_maker_confidence)
        .bind(&input.decision_maker_source)
        .bind(input.enrichment_status.to_json())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Find a lead by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Lead>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM leads WHERE id = $1");
        sqlx::query_as::<_, Lead>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
