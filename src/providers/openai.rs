//! Client for OpenAI-compatible chat-completion endpoints.
//!
//! Speaks the `/chat/completions` wire format, which most hosted and
//! self-hosted LLM servers accept. Images travel as `data:` URL parts.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::traits::{CompletionProvider, CompletionRequest};
use crate::error::retry_after;
use crate::types::Message;
use crate::{MealgateError, Result};

/// Default base URL for the OpenAI API
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default vision-capable model
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Transport-level timeout. The gateway applies its own, usually shorter,
/// per-attempt timeout on top.
const HTTP_TIMEOUT: Duration = Duration::from_secs(120);

/// Client for an OpenAI-compatible chat-completion API.
#[derive(Clone)]
pub struct OpenAiClient {
    api_key: String,
    http: Client,
    base_url: String,
    model: String,
}

impl OpenAiClient {
    /// Create a new client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Create a client with a custom base URL (for proxies, compatible
    /// servers, or testing with wiremock).
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| MealgateError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_key: api_key.into(),
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: DEFAULT_MODEL.to_string(),
        })
    }

    /// Set the model used for every request.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    /// Send one chat-completion request and return the first choice's text.
    pub async fn chat(&self, request: &CompletionRequest) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&ChatCompletionRequest {
                model: &self.model,
                messages: &request.messages,
                max_tokens: request.max_tokens,
                temperature: request.temperature,
            })
            .send()
            .await
            .map_err(|e| MealgateError::from_reqwest(e, HTTP_TIMEOUT))?;

        let status = response.status();
        let hint = retry_after(response.headers());
        let body = response
            .text()
            .await
            .map_err(|e| MealgateError::from_reqwest(e, HTTP_TIMEOUT))?;

        if !status.is_success() {
            return Err(MealgateError::from_status(status.as_u16(), hint, &body));
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&body)
            .map_err(|e| MealgateError::ParseFailed(format!("malformed completion: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| MealgateError::ParseFailed("empty completion".to_string()))
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl CompletionProvider for OpenAiClient {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        OpenAiClient::chat(self, request).await
    }
}
