//! Lead entity, candidate query, and partial-update DTO.
//!
//! Leads are owned by the product; the worker only reads candidate batches
//! and applies partial updates. The `enrichment_status` map is always merged
//! on update, never replaced.

use ninja_core::enrichment::{EnrichmentStatus, STAGE_WEBSITE_VALIDATED};
use ninja_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A row from the `leads` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Lead {
    pub id: DbId,
    pub campaign_id: DbId,
    pub company_name: Option<String>,
    pub company_website: Option<String>,
    pub domain: Option<String>,
    pub email: Option<String>,
    pub emails: Vec<String>,
    pub phone: Option<String>,
    pub phones: Vec<String>,
    pub social_facebook: Option<String>,
    pub social_instagram: Option<String>,
    pub social_linkedin: Option<String>,
    pub social_twitter: Option<String>,
    pub decision_maker_name: Option<String>,
    pub decision_maker_title: Option<String>,
    pub decision_maker_linkedin: Option<String>,
    pub decision_maker_confidence: Option<String>,
    pub decision_maker_source: Option<String>,
    #[sqlx(json)]
    pub enrichment_status: EnrichmentStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Lead {
    /// The website to enrich from: `company_website`, falling back to `domain`.
    /// Blank values count as absent.
    pub fn website(&self) -> Option<&str> {
        [&self.company_website, &self.domain]
            .into_iter()
            .filter_map(|v| v.as_deref())
            .map(str::trim)
            .find(|v| !v.is_empty())
    }

    /// Display name for log lines.
    pub fn display_name(&self) -> &str {
        self.company_name.as_deref().unwrap_or("?")
    }

    /// Current value of a nullable field used as a "needs enrichment" filter.
    pub fn field(&self, field: LeadField) -> Option<&str> {
        match field {
            LeadField::Email => self.email.as_deref(),
            LeadField::DecisionMakerName => self.decision_maker_name.as_deref(),
        }
    }
}

// ---------------------------------------------------------------------------
// Candidate query
// ---------------------------------------------------------------------------

/// Nullable lead columns a handler may require to still be empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeadField {
    Email,
    DecisionMakerName,
}

impl LeadField {
    /// Column name. Only ever interpolated from this fixed set.
    pub fn column(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::DecisionMakerName => "decision_maker_name",
        }
    }
}

/// Store-level filter for a batch of candidate leads.
///
/// All predicates are applied before `limit`, so the batch cap counts only
/// leads that are actually eligible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeadQuery {
    pub campaign_id: DbId,
    pub limit: i64,
    /// Require this column to be `NULL` (skips already-enriched leads).
    pub missing: Option<LeadField>,
    /// Require `enrichment_status.website_validated = true`.
    pub validated_only: bool,
}

impl LeadQuery {
    /// `enrichment_status @> $filter` value for validated-only queries.
    pub fn validated_filter() -> serde_json::Value {
        let mut filter = serde_json::Map::new();
        filter.insert(STAGE_WEBSITE_VALIDATED.to_string(), serde_json::Value::Bool(true));
        serde_json::Value::Object(filter)
    }

    /// Whether `lead` satisfies every predicate except the limit.
    pub fn matches(&self, lead: &Lead) -> bool {
        lead.campaign_id == self.campaign_id
            && self.missing.map_or(true, |field| lead.field(field).is_none())
            && (!self.validated_only || lead.enrichment_status.is_website_validated())
    }
}

// ---------------------------------------------------------------------------
// Partial update
// ---------------------------------------------------------------------------

/// Partial update for a lead. `None` fields are left unchanged; the
/// `enrichment_status` entries are merged into the stored map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeadUpdate {
    pub email: Option<String>,
    pub emails: Option<Vec<String>>,
    pub phone: Option<String>,
    pub phones: Option<Vec<String>>,
    pub social_facebook: Option<String>,
    pub social_instagram: Option<String>,
    pub social_linkedin: Option<String>,
    pub social_twitter: Option<String>,
    pub decision_maker_name: Option<String>,
    pub decision_maker_title: Option<String>,
    pub decision_maker_linkedin: Option<String>,
    pub decision_maker_confidence: Option<String>,
    pub decision_maker_source: Option<String>,
    #[serde(default)]
    pub enrichment_status: EnrichmentStatus,
}

impl LeadUpdate {
    /// Update that only records a stage outcome.
    pub fn stage_outcome(stage: &str, outcome: &str) -> Self {
        Self {
            enrichment_status: EnrichmentStatus::new().with_outcome(stage, outcome),
            ..Self::default()
        }
    }

    /// `true` when applying this update would change nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply this update to an in-memory lead using the same semantics as
    /// [`LeadRepo::update`](crate::repositories::LeadRepo::update).
    pub fn apply_to(&self, lead: &mut Lead) {
        fn set<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(v) = value {
                *target = v.clone();
            }
        }
        fn set_opt<T: Clone>(target: &mut Option<T>, value: &Option<T>) {
            if value.is_some() {
                *target = value.clone();
            }
        }

        set_opt(&mut lead.email, &self.email);
        set(&mut lead.emails, &self.emails);
        set_opt(&mut lead.phone, &self.phone);
        set(&mut lead.phones, &self.phones);
        set_opt(&mut lead.social_facebook, &self.social_facebook);
        set_opt(&mut lead.social_instagram, &self.social_instagram);
        set_opt(&mut lead.social_linkedin, &self.social_linkedin);
        set_opt(&mut lead.social_twitter, &self.social_twitter);
        set_opt(&mut lead.decision_maker_name, &self.decision_maker_name);
        set_opt(&mut lead.decision_maker_title, &self.decision_maker_title);
        set_opt(&mut lead.decision_maker_linkedin, &self.decision_maker_linkedin);
        set_opt(&mut lead.decision_maker_confidence, &self.decision_maker_confidence);
        set_opt(&mut lead.decision_maker_source, &self.decision_maker_source);
        lead.enrichment_status.merge(&self.enrichment_status);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
