//! Company web page fetching and rough HTML-to-text reduction.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;

use super::{build_http_client, ClientError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                          AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Bodies this short are error pages or redirects, not content.
const MIN_BODY_LEN: usize = 200;

static SCRIPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script[^>]*>.*?</script>").expect("valid regex"));
static STYLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<style[^>]*>.*?</style>").expect("valid regex"));
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));
static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Fetches a web page as plain text.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Text of the page at `url`, or `None` when it is missing or too short.
    async fn fetch_text(&self, url: &str) -> Result<Option<String>, ClientError>;
}

pub struct PageFetcher {
    client: reqwest::Client,
}

impl PageFetcher {
    pub fn new() -> Result<Self, ClientError> {
        Ok(Self {
            client: build_http_client(REQUEST_TIMEOUT, Some(USER_AGENT))?,
        })
    }
}

#[async_trait]
impl PageSource for PageFetcher {
    async fn fetch_text(&self, url: &str) -> Result<Option<String>, ClientError> {
        let response = self.client.get(url).send().await?;
        if response.status() != reqwest::StatusCode::OK {
            return Ok(None);
        }
        let body = response.text().await?;
        if body.len() <= MIN_BODY_LEN {
            return Ok(None);
        }
        Ok(Some(html_to_text(&body)))
    }
}

/// Drop `<script>`/`<style>` blocks and tags, then collapse whitespace.
pub fn html_to_text(html: &str) -> String {
    let text = SCRIPT_RE.replace_all(html, "");
    let text = STYLE_RE.replace_all(&text, "");
    let text = TAG_RE.replace_all(&text, " ");
    WHITESPACE_RE.replace_all(&text, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_scripts_styles_and_tags() {
        let html = r#"<html><head><style>body { color: red; }</style>
            <script type="text/javascript">var owner = "nobody";</script></head>
            <body><h1>About   us</h1><p>Jane Doe, <b>Owner</b></p></body></html>"#;
        assert_eq!(html_to_text(html), "About us Jane Doe, Owner");
    }

    #[test]
    fn multiline_script_blocks_are_removed() {
        let html = "<p>a</p><SCRIPT>\nline1\nline2\n</SCRIPT><p>b</p>";
        assert_eq!(html_to_text(html), "a b");
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(html_to_text("  just\n\ttext  "), "just text");
    }
}
