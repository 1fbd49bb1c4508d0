//! `find_decision_makers`: crawl a company's about/team/contact pages and
//! ask a language model for the owner, founder or CEO.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ninja_core::enrichment::{OUTCOME_DONE, OUTCOME_NOT_FOUND, STAGE_FIND_DECISION_MAKERS};
use ninja_db::models::lead::{LeadField, LeadUpdate};

use super::{prepare_batch, BatchRequest, JobHandler};
use crate::clients::openai::{self, DecisionMakerExtractor};
use crate::clients::pages::PageSource;
use crate::clients::{base_url, join_url, normalize_url, ClientError};
use crate::context::JobContext;
use crate::error::HandlerResult;
use crate::runner::{EnrichmentRunner, RecordOutcome};

pub const JOB_TYPE: &str = "find_decision_makers";

/// Sub-pages tried after the homepage, in priority order.
pub const ABOUT_PATHS: [&str; 9] = [
    "/about",
    "/about-us",
    "/team",
    "/our-team",
    "/leadership",
    "/management",
    "/staff",
    "/contact",
    "/contact-us",
];

const MAX_PAGES: usize = 3;
/// Sub-pages shorter than this (in characters) are skipped.
const MIN_SUBPAGE_CHARS: usize = 500;
const PAGE_EXCERPT_CHARS: usize = 4_000;
const PROMPT_CHARS: usize = 10_000;

const CONFIDENCE: &str = "medium";

const CONCURRENCY: usize = 3;
const FLUSH_EVERY: u64 = 5;
/// Up to ten page fetches plus one model call per lead.
const RECORD_TIMEOUT: Duration = Duration::from_secs(150);

pub struct FindDecisionMakersHandler {
    pages: Arc<dyn PageSource>,
    extractor: Arc<dyn DecisionMakerExtractor>,
}

impl FindDecisionMakersHandler {
    pub fn new(pages: Arc<dyn PageSource>, extractor: Arc<dyn DecisionMakerExtractor>) -> Self {
        Self { pages, extractor }
    }
}

#[async_trait]
impl JobHandler for FindDecisionMakersHandler {
    async fn run(&self, ctx: &JobContext) -> HandlerResult<()> {
        let request = BatchRequest {
            service: openai::SERVICE,
            missing_key_message: "OpenAI API key not configured",
            missing_field: LeadField::DecisionMakerName,
            empty_validated_message: "No validated leads found. Run clean & validate first.",
            empty_message: "No leads need decision maker enrichment",
        };
        let Some(batch) = prepare_batch(ctx, &request).await? else {
            return Ok(());
        };

        tracing::info!(job_id = %ctx.job_id(), leads = batch.leads.len(), "Processing leads for decision maker enrichment");

        let api_key: Arc<str> = batch.api_key.into();
        let summary = EnrichmentRunner::new("found")
            .with_concurrency(CONCURRENCY)
            .with_flush_every(FLUSH_EVERY)
            .with_record_timeout(RECORD_TIMEOUT)
            .run(ctx, batch.leads, |lead| {
                let pages = Arc::clone(&self.pages);
                let extractor = Arc::clone(&self.extractor);
                let api_key = Arc::clone(&api_key);
                async move {
                    let Some(website) = lead.website() else {
                        return Ok(RecordOutcome::Miss(None));
                    };
                    let site = base_url(&normalize_url(website));
                    match find_from_website(pages.as_ref(), extractor.as_ref(), &api_key, &site).await? {
                        Some(update) => {
                            tracing::info!(
                                lead = lead.display_name(),
                                name = update.decision_maker_name.as_deref().unwrap_or_default(),
                                "Found decision maker",
                            );
                            Ok(RecordOutcome::Hit(update))
                        }
                        None => Ok(RecordOutcome::Miss(Some(LeadUpdate::stage_outcome(
                            STAGE_FIND_DECISION_MAKERS,
                            OUTCOME_NOT_FOUND,
                        )))),
                    }
                }
            })
            .await?;

        ctx.complete(summary.to_result()).await
    }
}

/// Crawl `site` and extract a decision maker from the pages found.
///
/// Page fetch failures only mean that page is skipped; a failing model call
/// is returned as an error.
pub async fn find_from_website(
    pages: &dyn PageSource,
    extractor: &dyn DecisionMakerExtractor,
    api_key: &str,
    site: &str,
) -> Result<Option<LeadUpdate>, ClientError> {
    let mut found: Vec<(String, String)> = Vec::new();

    if let Some(text) = fetch_quietly(pages, site).await {
        found.push((site.to_string(), text));
    }

    for path in ABOUT_PATHS {
        let url = join_url(site, path);
        let Some(text) = fetch_quietly(pages, &url).await else {
            continue;
        };
        if text.chars().count() > MIN_SUBPAGE_CHARS {
            found.push((url, text));
            if found.len() >= MAX_PAGES {
                break;
            }
        }
    }

    if found.is_empty() {
        return Ok(None);
    }

    let mut combined = String::new();
    for (url, text) in &found {
        combined.push_str(&format!(
            "\n--- Page: {url} ---\n{}\n",
            truncate_chars(text, PAGE_EXCERPT_CHARS)
        ));
    }

    let Some(dm) = extractor
        .extract(api_key, truncate_chars(&combined, PROMPT_CHARS))
        .await?
    else {
        return Ok(None);
    };

    let sources: Vec<&str> = found.iter().map(|(url, _)| url.as_str()).collect();
    let mut update = LeadUpdate {
        decision_maker_name: non_blank(dm.name),
        decision_maker_title: non_blank(dm.title),
        decision_maker_linkedin: non_blank(dm.linkedin),
        decision_maker_confidence: Some(CONFIDENCE.to_string()),
        decision_maker_source: Some(sources.join(", ")),
        ..LeadUpdate::default()
    };
    update
        .enrichment_status
        .set_outcome(STAGE_FIND_DECISION_MAKERS, OUTCOME_DONE);
    Ok(Some(update))
}

async fn fetch_quietly(pages: &dyn PageSource, url: &str) -> Option<String> {
    match pages.fetch_text(url).await {
        Ok(text) => text,
        Err(e) => {
            tracing::debug!(url, error = %e, "Page fetch failed");
            None
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// The first `max` characters of `text`.
fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
