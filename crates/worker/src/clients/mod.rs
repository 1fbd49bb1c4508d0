//! HTTP clients for the external services the handlers call.
//!
//! Each service sits behind a small async trait so handlers can be driven by
//! fakes in tests:
//!
//! - [`contacts::ContactSource`] scrapes contact details for a website.
//! - [`pages::PageSource`] fetches a page and reduces it to plain text.
//! - [`openai::DecisionMakerExtractor`] pulls a decision maker out of text.

pub mod contacts;
pub mod openai;
pub mod pages;

use std::time::Duration;

use reqwest::Url;

/// Errors from the external HTTP clients.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service returned a non-2xx status code.
    #[error("API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The service answered 2xx but the payload was not what we expected.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Return the response unchanged on a 2xx status, or an
/// [`ClientError::ApiError`] carrying the status and body text.
pub(crate) async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        return Err(ClientError::ApiError {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

/// Build a client with a fixed request timeout.
pub(crate) fn build_http_client(
    timeout: Duration,
    user_agent: Option<&str>,
) -> Result<reqwest::Client, ClientError> {
    let mut builder = reqwest::Client::builder().timeout(timeout);
    if let Some(agent) = user_agent {
        builder = builder.user_agent(agent);
    }
    Ok(builder.build()?)
}

/// Prefix `https://` unless the value already carries an http(s) scheme.
pub fn normalize_url(website: &str) -> String {
    let website = website.trim();
    if website.starts_with("http") {
        website.to_string()
    } else {
        format!("https://{website}")
    }
}

/// `scheme://host[:port]` of `url`, dropping any path, query or fragment.
///
/// Falls back to the input when it cannot be parsed.
pub fn base_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => match parsed.host_str() {
            Some(host) => match parsed.port() {
                Some(port) => format!("{}://{host}:{port}", parsed.scheme()),
                None => format!("{}://{host}", parsed.scheme()),
            },
            None => url.to_string(),
        },
        Err(_) => url.to_string(),
    }
}

/// Resolve `path` against `base`, the way a browser resolves an absolute
/// path on the same origin.
pub fn join_url(base: &str, path: &str) -> String {
    Url::parse(base)
        .and_then(|b| b.join(path))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| format!("{}{path}", base.trim_end_matches('/')))
}
