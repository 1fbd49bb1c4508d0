//! Per-lead enrichment status map.
//!
//! Every enrichment stage records its own outcome under its own key in the
//! lead's `enrichment_status` JSON object. Stages never own the whole map, so
//! writes are always a shallow key-wise union where the incoming keys win and
//! every other key is left untouched.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Stage names and outcome tags
// ---------------------------------------------------------------------------

/// Stage written by the contact-scraping handler.
pub const STAGE_FIND_EMAILS: &str = "find_emails";

/// Stage written by the decision-maker handler.
pub const STAGE_FIND_DECISION_MAKERS: &str = "find_decision_makers";

/// Flag written by the upstream website validation step (boolean value).
pub const STAGE_WEBSITE_VALIDATED: &str = "website_validated";

/// Outcome tag: the stage produced data for this lead.
pub const OUTCOME_DONE: &str = "done";

/// Outcome tag: the stage ran but found nothing.
pub const OUTCOME_NOT_FOUND: &str = "not_found";

// ---------------------------------------------------------------------------
// EnrichmentStatus
// ---------------------------------------------------------------------------

/// Mapping from stage name to outcome value.
///
/// Values are usually outcome tags (`"done"`, `"not_found"`) but upstream
/// stages may store other JSON scalars, e.g. `website_validated: true`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnrichmentStatus(BTreeMap<String, serde_json::Value>);

impl EnrichmentStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a status map from a stored JSON value.
    ///
    /// Anything that is not a JSON object (including `null`) yields an empty
    /// map rather than an error; legacy rows may carry either.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Object(map) => {
                Self(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            }
            _ => Self::default(),
        }
    }

    /// Builder form of [`set_outcome`](Self::set_outcome).
    pub fn with_outcome(mut self, stage: impl Into<String>, outcome: &str) -> Self {
        self.set_outcome(stage, outcome);
        self
    }

    /// Record a string outcome tag for `stage`.
    pub fn set_outcome(&mut self, stage: impl Into<String>, outcome: &str) {
        self.0
            .insert(stage.into(), serde_json::Value::String(outcome.to_string()));
    }

    /// Record an arbitrary JSON value for `stage`.
    pub fn set(&mut self, stage: impl Into<String>, value: serde_json::Value) {
        self.0.insert(stage.into(), value);
    }

    pub fn get(&self, stage: &str) -> Option<&serde_json::Value> {
        self.0.get(stage)
    }

    /// The outcome tag for `stage`, if it is stored as a string.
    pub fn outcome(&self, stage: &str) -> Option<&str> {
        self.0.get(stage).and_then(|v| v.as_str())
    }

    /// Whether the upstream validation step marked the lead's website valid.
    pub fn is_website_validated(&self) -> bool {
        matches!(
            self.0.get(STAGE_WEBSITE_VALIDATED),
            Some(serde_json::Value::Bool(true))
        )
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Merge `other` into `self`: keys from `other` are added or overwrite,
    /// keys only present in `self` are preserved.
    pub fn merge(&mut self, other: &EnrichmentStatus) {
        for (stage, value) in &other.0 {
            self.0.insert(stage.clone(), value.clone());
        }
    }

    /// Consuming form of [`merge`](Self::merge).
    pub fn merged(mut self, other: &EnrichmentStatus) -> Self {
        self.merge(other);
        self
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_preserves_unrelated_stages() {
        let mut existing = EnrichmentStatus::new().with_outcome("stage_a", OUTCOME_DONE);
        let patch = EnrichmentStatus::new().with_outcome("stage_b", OUTCOME_DONE);

        existing.merge(&patch);

        assert_eq!(
            existing.to_json(),
            json!({"stage_a": "done", "stage_b": "done"})
        );
    }

    #[test]
    fn merge_overwrites_same_stage() {
        let existing = EnrichmentStatus::new().with_outcome(STAGE_FIND_EMAILS, OUTCOME_NOT_FOUND);
        let patch = EnrichmentStatus::new().with_outcome(STAGE_FIND_EMAILS, OUTCOME_DONE);

        let merged = existing.merged(&patch);

        assert_eq!(merged.outcome(STAGE_FIND_EMAILS), Some(OUTCOME_DONE));
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn merge_with_empty_patch_is_noop() {
        let existing = EnrichmentStatus::from_json(&json!({"website_validated": true}));
        let merged = existing.clone().merged(&EnrichmentStatus::new());
        assert_eq!(merged, existing);
    }

    #[test]
    fn from_json_non_object_is_empty() {
        assert!(EnrichmentStatus::from_json(&serde_json::Value::Null).is_empty());
        assert!(EnrichmentStatus::from_json(&json!([1, 2])).is_empty());
    }

    #[test]
    fn website_validated_requires_boolean_true() {
        assert!(EnrichmentStatus::from_json(&json!({"website_validated": true}))
            .is_website_validated());
        assert!(!EnrichmentStatus::from_json(&json!({"website_validated": "true"}))
            .is_website_validated());
        assert!(!EnrichmentStatus::new().is_website_validated());
    }

    #[test]
    fn serializes_as_plain_object() {
        let status = EnrichmentStatus::new().with_outcome(STAGE_FIND_DECISION_MAKERS, OUTCOME_DONE);
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value, json!({"find_decision_makers": "done"}));

        let back: EnrichmentStatus = serde_json::from_value(value).unwrap();
        assert_eq!(back, status);
    }
}
