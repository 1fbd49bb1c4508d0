//! Job handlers.
//!
//! A handler owns the whole lifecycle of one job type: it reads its config,
//! fetches its batch of leads, enriches them through the
//! [`EnrichmentRunner`](crate::runner::EnrichmentRunner), and finishes the
//! job with `complete` or `fail`.

pub mod find_decision_makers;
pub mod find_emails;

use std::sync::Arc;

use async_trait::async_trait;
use ninja_core::job_config::EnrichmentConfig;
use ninja_db::models::lead::{Lead, LeadField, LeadQuery};

use crate::clients::contacts::OpenWebNinjaClient;
use crate::clients::openai::OpenAiClient;
use crate::clients::pages::PageFetcher;
use crate::clients::ClientError;
use crate::context::JobContext;
use crate::error::{HandlerError, HandlerResult};
use crate::registry::HandlerRegistry;

pub use find_decision_makers::FindDecisionMakersHandler;
pub use find_emails::FindEmailsHandler;

/// Processes one claimed job.
///
/// Implementations must finish the job through `ctx.complete` or `ctx.fail`
/// before returning `Ok`. Returning `Err` (or panicking) makes the
/// dispatcher mark the job failed with the error text.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn run(&self, ctx: &JobContext) -> HandlerResult<()>;
}

/// Registry with every built-in handler wired to the real HTTP clients.
pub fn default_registry() -> Result<HandlerRegistry, ClientError> {
    let emails = FindEmailsHandler::new(Arc::new(OpenWebNinjaClient::new()?));
    let decision_makers =
        FindDecisionMakersHandler::new(Arc::new(PageFetcher::new()?), Arc::new(OpenAiClient::new()?));

    Ok(HandlerRegistry::new()
        .register(find_emails::JOB_TYPE, Arc::new(emails))
        .register(find_decision_makers::JOB_TYPE, Arc::new(decision_makers)))
}

// ---------------------------------------------------------------------------
// Shared batch preparation
// ---------------------------------------------------------------------------

/// What a handler needs from [`prepare_batch`].
pub(crate) struct BatchRequest {
    /// Credential service consulted before any network call.
    pub service: &'static str,
    /// Job error when the credential is absent.
    pub missing_key_message: &'static str,
    /// Column that must still be empty unless `include_existing` is set.
    pub missing_field: LeadField,
    /// Completion message for an empty batch when `validated_only` is set.
    pub empty_validated_message: &'static str,
    /// Completion message for an empty batch otherwise.
    pub empty_message: &'static str,
}

/// A non-empty batch ready for the runner.
pub(crate) struct Batch {
    pub api_key: String,
    pub leads: Vec<Lead>,
}

/// Validate config, resolve the credential, and fetch leads with a website.
///
/// Returns `None` when the job has already been finished here: failed for a
/// configuration problem, or completed because there was nothing to do.
pub(crate) async fn prepare_batch(
    ctx: &JobContext,
    request: &BatchRequest,
) -> HandlerResult<Option<Batch>> {
    let config: EnrichmentConfig = match ctx.config() {
        Ok(config) => config,
        Err(HandlerError::Config(message)) => {
            ctx.fail(&message).await?;
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    let Some(api_key) = ctx.api_key(request.service) else {
        ctx.fail(request.missing_key_message).await?;
        return Ok(None);
    };

    let Some(campaign_id) = ctx.campaign_id() else {
        ctx.fail("Job has no campaign_id").await?;
        return Ok(None);
    };

    let query = LeadQuery {
        campaign_id,
        limit: config.max_leads,
        missing: (!config.include_existing).then_some(request.missing_field),
        validated_only: config.validated_only,
    };
    let fetched = ctx.fetch_leads(&query).await?;
    let fetched_count = fetched.len();

    let leads: Vec<Lead> = fetched.into_iter().filter(|l| l.website().is_some()).collect();
    tracing::info!(
        job_id = %ctx.job_id(),
        job_type = ctx.job_type(),
        fetched = fetched_count,
        with_website = leads.len(),
        validated_only = config.validated_only,
        include_existing = config.include_existing,
        "Fetched candidate leads",
    );

    if leads.is_empty() {
        let message = if config.validated_only {
            request.empty_validated_message
        } else {
            request.empty_message
        };
        ctx.complete(serde_json::json!({ "processed": 0, "message": message }))
            .await?;
        return Ok(None);
    }

    Ok(Some(Batch { api_key, leads }))
}
