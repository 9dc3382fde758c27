//! Provider trait for chat-completion backends.
//!
//! The analyzer depends only on [`CompletionProvider`], so tests and
//! alternative vendors plug in without touching the caching or retry
//! layers.

use async_trait::async_trait;

use crate::Result;
use crate::types::Message;

/// One chat-completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            max_tokens: None,
            temperature: None,
        }
    }

    pub fn max_tokens(mut self, n: u32) -> Self {
        self.max_tokens = Some(n);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.temperature = Some(t);
        self
    }
}

/// Provider for chat completions.
///
/// Implementations perform exactly one upstream call per invocation;
/// retries and timeouts are the gateway's job.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Provider name for logging/debugging.
    fn name(&self) -> &str;

    /// Return the text of the first completion choice.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}
