//! Builder for [`MealAnalyzer`].

use std::sync::Arc;
use std::time::Duration;

use super::MealAnalyzer;
use crate::analysis::FallbackGenerator;
use crate::cache::{CacheConfig, DEFAULT_PREFIX_CHARS, ResponseCache};
use crate::gateway::{CallGateway, DEFAULT_TIMEOUT, RetryConfig};
use crate::providers::CompletionProvider;

/// Default completion budget for one analysis.
pub const DEFAULT_MAX_TOKENS: u32 = 1_000;

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Builder for configuring analyzer instances.
pub struct MealAnalyzerBuilder {
    provider: Arc<dyn CompletionProvider>,
    retry: RetryConfig,
    timeout: Duration,
    cache: CacheConfig,
    fallback: Option<FallbackGenerator>,
    prefix_chars: usize,
    max_tokens: u32,
    temperature: f32,
}

impl MealAnalyzerBuilder {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            provider,
            retry: RetryConfig::default(),
            timeout: DEFAULT_TIMEOUT,
            cache: CacheConfig::default(),
            fallback: None,
            prefix_chars: DEFAULT_PREFIX_CHARS,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    /// Retry policy for upstream calls.
    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = config;
        self
    }

    /// Per-attempt timeout for upstream calls.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Response cache sizing and TTL.
    pub fn cache(mut self, config: CacheConfig) -> Self {
        self.cache = config;
        self
    }

    /// Inject the fallback generator (e.g. a seeded one in tests).
    pub fn fallback(mut self, generator: FallbackGenerator) -> Self {
        self.fallback = Some(generator);
        self
    }

    /// Number of payload characters folded into fingerprints.
    pub fn fingerprint_prefix(mut self, chars: usize) -> Self {
        self.prefix_chars = chars;
        self
    }

    pub fn max_tokens(mut self, n: u32) -> Self {
        self.max_tokens = n;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.temperature = t;
        self
    }

    pub fn build(self) -> MealAnalyzer {
        MealAnalyzer {
            provider: self.provider,
            gateway: CallGateway::new(self.retry, self.timeout),
            cache: ResponseCache::new(self.cache),
            fallback: self.fallback.unwrap_or_default(),
            prefix_chars: self.prefix_chars,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}
