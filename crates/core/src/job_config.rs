//! Typed job configuration.
//!
//! A job's `config` column is an opaque JSON object. Handlers read it through
//! a typed struct whose missing keys fall back to defaults; the struct is
//! validated once, when the handler asks for it.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default batch cap when `max_leads` is absent.
pub const DEFAULT_MAX_LEADS: i64 = 100;

/// Upper bound accepted for `max_leads`.
pub const MAX_LEADS_LIMIT: i64 = 10_000;

// ---------------------------------------------------------------------------
// JobConfig trait
// ---------------------------------------------------------------------------

/// A handler-specific configuration struct.
///
/// Implementors use `#[serde(default)]` so that every key is optional.
pub trait JobConfig: DeserializeOwned + Default {
    /// Check invariants that serde cannot express.
    fn validate(&self) -> Result<(), CoreError> {
        Ok(())
    }
}

/// Parse and validate a job's raw `config` value.
///
/// `null` is treated as an empty object.
pub fn parse_config<T: JobConfig>(raw: &serde_json::Value) -> Result<T, CoreError> {
    let config: T = if raw.is_null() {
        T::default()
    } else {
        serde_json::from_value(raw.clone())
            .map_err(|e| CoreError::Validation(format!("Invalid job config: {e}")))?
    };
    config.validate()?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// EnrichmentConfig
// ---------------------------------------------------------------------------

/// Configuration shared by the lead enrichment handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Maximum number of leads fetched for the batch.
    pub max_leads: i64,
    /// Reprocess leads that already carry this stage's output.
    pub include_existing: bool,
    /// Only consider leads whose website was validated upstream.
    pub validated_only: bool,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            max_leads: DEFAULT_MAX_LEADS,
            include_existing: false,
            validated_only: true,
        }
    }
}

impl JobConfig for EnrichmentConfig {
    fn validate(&self) -> Result<(), CoreError> {
        if !(1..=MAX_LEADS_LIMIT).contains(&self.max_leads) {
            return Err(CoreError::Validation(format!(
                "max_leads must be between 1 and {MAX_LEADS_LIMIT}, got {}",
                self.max_leads
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
