//! Synthetic analyses for when the model is unavailable.
//!
//! The generator produces a structurally valid [`NutritionAnalysis`] with
//! plausible magnitudes so the client stays usable. It is not a model of
//! nutrition. Results are tagged [`AnalysisSource::Fallback`], carry
//! [`FALLBACK_CONFIDENCE`] and a locale-specific disclaimer.

use std::ops::RangeInclusive;
use std::sync::{Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::types::{AnalysisSource, FALLBACK_CONFIDENCE, Language, NutritionAnalysis};

/// Range the synthetic calorie value is drawn from (kcal).
pub const FALLBACK_CALORIES: RangeInclusive<u32> = 300..=700;

/// Longest food name taken from a user's update text.
const MAX_NAME_CHARS: usize = 60;

/// Randomized fallback generator with an injected random source.
///
/// ```rust
/// # use mealgate::{FallbackGenerator, Language};
/// let generator = FallbackGenerator::seeded(7);
/// let analysis = generator.generate(Language::English, None);
/// assert_eq!(analysis.confidence, 65);
/// assert!((300.0..=700.0).contains(&analysis.calories));
/// ```
pub struct FallbackGenerator {
    rng: Mutex<StdRng>,
}

impl Default for FallbackGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl FallbackGenerator {
    /// Generator seeded from the operating system.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// Deterministic generator for tests and reproducible runs.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    pub fn with_rng(rng: StdRng) -> Self {
        Self {
            rng: Mutex::new(rng),
        }
    }

    /// Produce a synthetic analysis.
    ///
    /// Calories are drawn from [`FALLBACK_CALORIES`]; protein, fat and carb
    /// energy shares are random and sum to 1, converted to grams at 4, 9
    /// and 4 kcal/g. A non-blank `update_text` becomes the food name.
    pub fn generate(&self, language: Language, update_text: Option<&str>) -> NutritionAnalysis {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);

        let calories = f64::from(rng.random_range(FALLBACK_CALORIES));
        let protein_share: f64 = rng.random_range(0.15..0.35);
        let fat_share: f64 = rng.random_range(0.20..0.35);
        let carbs_share = 1.0 - protein_share - fat_share;

        let protein = round1(calories * protein_share / 4.0);
        let fat = round1(calories * fat_share / 9.0);
        let carbs = round1(calories * carbs_share / 4.0);
        let saturated_fat = round1(fat * rng.random_range(0.25..0.40));

        let food_name = update_text
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| t.chars().take(MAX_NAME_CHARS).collect())
            .unwrap_or_else(|| language.unknown_food().to_string());

        NutritionAnalysis {
            food_name,
            serving_size: language.default_serving().to_string(),
            cooking_method: language.unknown_cooking_method().to_string(),
            calories,
            protein,
            carbs,
            fat,
            fiber: round1(rng.random_range(2.0..8.0)),
            sugar: round1(rng.random_range(3.0..15.0)),
            sodium: f64::from(rng.random_range(300u32..=900)),
            cholesterol: f64::from(rng.random_range(20u32..=120)),
            saturated_fat,
            confidence: FALLBACK_CONFIDENCE,
            ingredients: Vec::new(),
            health_notes: language.fallback_disclaimer().to_string(),
            source: AnalysisSource::Fallback,
        }
    }
}

fn round1(n: f64) -> f64 {
    (n * 10.0).round() / 10.0
}
