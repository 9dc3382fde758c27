//! Meal analysis service.
//!
//! [`MealAnalyzer`] composes the pieces of the analysis path:
//!
//! ```text
//! fingerprint ─▶ ResponseCache ─(miss)─▶ CallGateway ─▶ CompletionProvider
//!                     │                                        │
//!                     │◀──────── parse_analysis(text) ◀────────┘
//!                     ▼
//!              Ok(analysis) │ Err(_) ─▶ FallbackGenerator
//! ```
//!
//! Every public method returns a [`NutritionAnalysis`]. Upstream failures,
//! exhausted retries and unparsable output all degrade to a synthetic
//! result tagged [`AnalysisSource::Fallback`](crate::AnalysisSource::Fallback);
//! check [`NutritionAnalysis::is_fallback()`] to tell them apart.

mod builder;
mod prompt;

use std::sync::Arc;

use tracing::{debug, warn};

pub use builder::{DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE, MealAnalyzerBuilder};

use crate::analysis::{FallbackGenerator, parse_analysis};
use crate::cache::{Fingerprint, ResponseCache};
use crate::gateway::CallGateway;
use crate::providers::{CompletionProvider, CompletionRequest};
use crate::telemetry;
use crate::types::{ImageInput, Language, Message, NutritionAnalysis};

/// Cached, deduplicated, retrying nutrition analysis.
pub struct MealAnalyzer {
    provider: Arc<dyn CompletionProvider>,
    gateway: CallGateway,
    cache: ResponseCache<NutritionAnalysis>,
    fallback: FallbackGenerator,
    prefix_chars: usize,
    max_tokens: u32,
    temperature: f32,
}

impl MealAnalyzer {
    /// Create a new builder around `provider`.
    pub fn builder(provider: Arc<dyn CompletionProvider>) -> MealAnalyzerBuilder {
        MealAnalyzerBuilder::new(provider)
    }

    /// Analyze a meal photo.
    pub async fn analyze_image(&self, image: &ImageInput, language: Language) -> NutritionAnalysis {
        let fingerprint = self.fingerprint("image", language, &image.data);
        let messages = vec![
            Message::system(prompt::system(language)),
            Message::user_with_image(prompt::image_request(), image),
        ];
        self.run("analyze_image", fingerprint, messages, language, None)
            .await
    }

    /// Analyze a free-text meal description.
    pub async fn analyze_text(&self, description: &str, language: Language) -> NutritionAnalysis {
        let fingerprint = self.fingerprint("text", language, description);
        let messages = vec![
            Message::system(prompt::system(language)),
            Message::user(prompt::text_request(description)),
        ];
        self.run("analyze_text", fingerprint, messages, language, None)
            .await
    }

    /// Re-analyze `previous` with the user's correction applied.
    ///
    /// On failure the fallback is named after `update_text`.
    pub async fn update_analysis(
        &self,
        previous: &NutritionAnalysis,
        update_text: &str,
        language: Language,
    ) -> NutritionAnalysis {
        let payload = format!("{update_text}|{}", previous.food_name);
        let fingerprint = self.fingerprint("update", language, &payload);
        let messages = vec![
            Message::system(prompt::system(language)),
            Message::user(prompt::update_request(previous, update_text)),
        ];
        self.run(
            "update_analysis",
            fingerprint,
            messages,
            language,
            Some(update_text),
        )
        .await
    }

    /// The response cache, for inspection and invalidation.
    pub fn cache(&self) -> &ResponseCache<NutritionAnalysis> {
        &self.cache
    }

    /// Stop cache housekeeping. Pending analyses still complete.
    pub fn shutdown(&self) {
        self.cache.shutdown();
    }

    fn fingerprint(&self, kind: &str, language: Language, payload: &str) -> Fingerprint {
        Fingerprint::derive(kind, language.code(), payload, self.prefix_chars)
    }

    async fn run(
        &self,
        operation: &'static str,
        fingerprint: Fingerprint,
        messages: Vec<Message>,
        language: Language,
        update_text: Option<&str>,
    ) -> NutritionAnalysis {
        let provider = Arc::clone(&self.provider);
        let gateway = self.gateway.clone();
        let request = CompletionRequest::new(messages)
            .max_tokens(self.max_tokens)
            .temperature(self.temperature);

        let outcome = self
            .cache
            .get_or_compute(&fingerprint, move || async move {
                let text = gateway
                    .call(operation, || provider.complete(&request))
                    .await?;
                debug!(operation, provider = provider.name(), "received completion");
                parse_analysis(&text, language)
            })
            .await;

        match outcome {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!(operation, error = %e, "analysis failed, using fallback");
                metrics::counter!(telemetry::FALLBACKS_TOTAL, "operation" => operation)
                    .increment(1);
                self.fallback.generate(language, update_text)
            }
        }
    }
}
