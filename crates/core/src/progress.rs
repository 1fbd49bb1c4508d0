//! Job progress snapshots.
//!
//! A snapshot is written wholesale to the job's `progress` column each time a
//! handler reports; fields are never merged with the previous snapshot.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

const RESERVED: [&str; 2] = ["processed", "total"];

/// Counters describing how far a job has got.
///
/// Serialized flat: `{"processed": 4, "total": 10, "enriched": 2}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub processed: u64,
    pub total: u64,
    /// Handler-defined extra counters (e.g. `enriched`, `found`).
    #[serde(flatten)]
    pub counters: BTreeMap<String, u64>,
}

impl Progress {
    pub fn new(processed: u64, total: u64) -> Self {
        Self {
            processed,
            total,
            counters: BTreeMap::new(),
        }
    }

    /// Attach an extra counter. `processed` and `total` are reserved and
    /// ignored here.
    pub fn with_counter(mut self, name: impl Into<String>, value: u64) -> Self {
        let name = name.into();
        if !RESERVED.contains(&name.as_str()) {
            self.counters.insert(name, value);
        }
        self
    }

    /// Value of an extra counter, `0` when absent.
    pub fn counter(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    /// Flat JSON snapshot. The real counts always win over a counter that
    /// shares their name.
    pub fn to_json(&self) -> serde_json::Value {
        let mut map: serde_json::Map<String, serde_json::Value> = self
            .counters
            .iter()
            .map(|(name, value)| (name.clone(), (*value).into()))
            .collect();
        map.insert("processed".into(), self.processed.into());
        map.insert("total".into(), self.total.into());
        serde_json::Value::Object(map)
    }
}
