//! OpenAI chat-completions client for decision maker extraction.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{build_http_client, ensure_success, ClientError};

/// Credential service name for this API.
pub const SERVICE: &str = "openai";

pub const API_URL: &str = "https://api.openai.com/v1/chat/completions";

pub const MODEL: &str = "gpt-4o-mini";

const TEMPERATURE: f32 = 0.1;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const SYSTEM_PROMPT: &str = "You are extracting the owner, founder, or CEO of a company from their website content. \
Look for names associated with titles like Owner, Founder, CEO, President, Managing Director, Principal. \
Return JSON: {\"name\": \"Full Name\", \"title\": \"Their Title\", \"linkedin\": \"linkedin URL if found\"}\n\
If no decision maker can be identified, return: {\"name\": null}\n\
Only return the MOST senior person. Prefer Owner/Founder over other titles.";

/// The most senior person identified on a company's pages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DecisionMaker {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub linkedin: Option<String>,
}

impl DecisionMaker {
    /// Parse the model's JSON answer. A missing or blank `name` means no
    /// decision maker was identified.
    pub fn from_model_output(content: &str) -> Result<Option<Self>, ClientError> {
        let parsed: Self = serde_json::from_str(content)
            .map_err(|e| ClientError::InvalidResponse(format!("model output is not JSON: {e}")))?;
        let has_name = parsed
            .name
            .as_deref()
            .is_some_and(|n| !n.trim().is_empty());
        Ok(has_name.then_some(parsed))
    }
}

/// Extracts a decision maker from combined page text.
#[async_trait]
pub trait DecisionMakerExtractor: Send + Sync {
    async fn extract(
        &self,
        api_key: &str,
        content: &str,
    ) -> Result<Option<DecisionMaker>, ClientError>;
}

// ---- wire types ----

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    response_format: ResponseFormat,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiClient {
    client: reqwest::Client,
    api_url: String,
}

impl OpenAiClient {
    pub fn new() -> Result<Self, ClientError> {
        Ok(Self::with_client(
            build_http_client(REQUEST_TIMEOUT, None)?,
            API_URL.to_string(),
        ))
    }

    pub fn with_client(client: reqwest::Client, api_url: String) -> Self {
        Self { client, api_url }
    }
}

#[async_trait]
impl DecisionMakerExtractor for OpenAiClient {
    async fn extract(
        &self,
        api_key: &str,
        content: &str,
    ) -> Result<Option<DecisionMaker>, ClientError> {
        let request = ChatRequest {
            model: MODEL,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content,
                },
            ],
            response_format: ResponseFormat {
                kind: "json_object",
            },
            temperature: TEMPERATURE,
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        let body: ChatResponse = ensure_success(response).await?.json().await?;
        let answer = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ClientError::InvalidResponse("no completion choices".into()))?;

        DecisionMaker::from_model_output(&answer)
    }
}
