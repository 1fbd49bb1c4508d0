//! API key lookup for external services.
//!
//! Handlers ask for a key by service name before making any network call
//! and fail the job when it is absent.

use std::collections::HashMap;

/// Keyed secret lookup.
pub trait Credentials: Send + Sync {
    /// The API key for `service`, or `None` if not configured.
    fn api_key(&self, service: &str) -> Option<String>;
}

/// Reads `<SERVICE>_API_KEY` environment variables, e.g. `OPENAI_API_KEY`.
/// Empty values count as absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvCredentials;

impl EnvCredentials {
    /// Environment variable consulted for `service`.
    pub fn var_name(service: &str) -> String {
        format!("{}_API_KEY", service.to_ascii_uppercase().replace('-', "_"))
    }
}

impl Credentials for EnvCredentials {
    fn api_key(&self, service: &str) -> Option<String> {
        std::env::var(Self::var_name(service))
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

/// Fixed in-memory key set.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    keys: HashMap<String, String>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, service: impl Into<String>, key: impl Into<String>) -> Self {
        self.keys.insert(service.into(), key.into());
        self
    }
}

impl Credentials for StaticCredentials {
    fn api_key(&self, service: &str) -> Option<String> {
        self.keys.get(service).cloned()
    }
}
