//! `find_emails`: enrich leads with emails, phones and social profiles
//! scraped from their website.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ninja_core::enrichment::{OUTCOME_DONE, STAGE_FIND_EMAILS};
use ninja_db::models::lead::{LeadField, LeadUpdate};
use serde_json::Value;

use super::{prepare_batch, BatchRequest, JobHandler};
use crate::clients::contacts::{self, ContactSource};
use crate::context::JobContext;
use crate::error::HandlerResult;
use crate::runner::{EnrichmentRunner, RecordOutcome};

pub const JOB_TYPE: &str = "find_emails";

/// The scraper allows five requests per second.
const CONCURRENCY: usize = 5;
const FLUSH_EVERY: u64 = 10;
const RECORD_TIMEOUT: Duration = Duration::from_secs(45);

pub struct FindEmailsHandler {
    contacts: Arc<dyn ContactSource>,
}

impl FindEmailsHandler {
    pub fn new(contacts: Arc<dyn ContactSource>) -> Self {
        Self { contacts }
    }
}

#[async_trait]
impl JobHandler for FindEmailsHandler {
    async fn run(&self, ctx: &JobContext) -> HandlerResult<()> {
        let request = BatchRequest {
            service: contacts::SERVICE,
            missing_key_message: "OpenWeb Ninja API key not configured",
            missing_field: LeadField::Email,
            empty_validated_message:
                "No validated leads with websites found. Run clean & validate first.",
            empty_message: "No leads with websites found",
        };
        let Some(batch) = prepare_batch(ctx, &request).await? else {
            return Ok(());
        };

        tracing::info!(job_id = %ctx.job_id(), leads = batch.leads.len(), "Processing leads for email enrichment");

        let api_key: Arc<str> = batch.api_key.into();
        let summary = EnrichmentRunner::new("enriched")
            .with_concurrency(CONCURRENCY)
            .with_flush_every(FLUSH_EVERY)
            .with_record_timeout(RECORD_TIMEOUT)
            .run(ctx, batch.leads, |lead| {
                let contacts = Arc::clone(&self.contacts);
                let api_key = Arc::clone(&api_key);
                async move {
                    let Some(website) = lead.website() else {
                        return Ok(RecordOutcome::Miss(None));
                    };
                    let record = contacts.scrape_contacts(&api_key, website).await?;
                    Ok(match record.as_ref().and_then(map_contacts) {
                        Some(update) => RecordOutcome::Hit(update),
                        None => RecordOutcome::Miss(None),
                    })
                }
            })
            .await?;

        ctx.complete(summary.to_result()).await
    }
}

/// Map one scraper record onto lead fields.
///
/// Returns `None` when the record holds nothing usable; otherwise the update
/// also marks the `find_emails` stage as done.
pub fn map_contacts(record: &Value) -> Option<LeadUpdate> {
    let mut update = LeadUpdate::default();

    let emails = contact_values(record.get("emails"));
    if let Some(first) = emails.first() {
        update.email = Some(first.clone());
        update.emails = Some(emails);
    }

    let phones = contact_values(record.get("phone_numbers").or_else(|| record.get("phones")));
    if let Some(first) = phones.first() {
        update.phone = Some(first.clone());
        update.phones = Some(phones);
    }

    match record.get("social_media").or_else(|| record.get("socials")) {
        Some(Value::Array(entries)) => {
            for entry in entries.iter().filter_map(Value::as_object) {
                let platform = entry
                    .get("platform")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_lowercase();
                let Some(url) = entry
                    .get("url")
                    .or_else(|| entry.get("value"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
                else {
                    continue;
                };

                if platform.contains("facebook") {
                    update.social_facebook = Some(url);
                } else if platform.contains("instagram") {
                    update.social_instagram = Some(url);
                } else if platform.contains("linkedin") {
                    update.social_linkedin = Some(url);
                } else if platform.contains("twitter") || url.contains("x.com") {
                    update.social_twitter = Some(url);
                }
            }
        }
        Some(Value::Object(by_platform)) => {
            for (platform, url) in by_platform {
                let Some(url) = url.as_str().map(str::to_string) else {
                    continue;
                };
                match platform.to_lowercase().as_str() {
                    "facebook" => update.social_facebook = Some(url),
                    "instagram" => update.social_instagram = Some(url),
                    "linkedin" => update.social_linkedin = Some(url),
                    "twitter" => update.social_twitter = Some(url),
                    _ => {}
                }
            }
        }
        _ => {}
    }

    if update.is_empty() {
        return None;
    }
    update
        .enrichment_status
        .set_outcome(STAGE_FIND_EMAILS, OUTCOME_DONE);
    Some(update)
}

/// Values from `[{"value": ...}]` or `["..."]`, skipping blanks.
fn contact_values(raw: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(items)) = raw else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.as_str()),
            Value::Object(obj) => obj.get("value").and_then(Value::as_str),
            _ => None,
        })
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
