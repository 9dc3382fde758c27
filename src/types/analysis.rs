//! Normalized nutrition analysis result.

use serde::{Deserialize, Serialize};

/// Confidence assigned when the model omits one.
pub const DEFAULT_CONFIDENCE: u8 = 75;

/// Confidence of every synthetic analysis.
pub const FALLBACK_CONFIDENCE: u8 = 65;

/// Lowest and highest confidence a result can carry.
pub const MIN_CONFIDENCE: u8 = 1;
pub const MAX_CONFIDENCE: u8 = 100;

/// Where an analysis came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisSource {
    /// Parsed from an upstream model response.
    Model,
    /// Synthesized locally because the model or the parse step failed.
    Fallback,
}

/// Canonical analysis shape.
///
/// Every numeric field is always a finite, non-negative number and
/// `confidence` is always within `MIN_CONFIDENCE..=MAX_CONFIDENCE`,
/// whatever the upstream model returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NutritionAnalysis {
    pub food_name: String,
    pub serving_size: String,
    pub cooking_method: String,
    /// kcal
    pub calories: f64,
    /// grams
    pub protein: f64,
    /// grams
    pub carbs: f64,
    /// grams
    pub fat: f64,
    /// grams
    pub fiber: f64,
    /// grams
    pub sugar: f64,
    /// milligrams
    pub sodium: f64,
    /// milligrams
    pub cholesterol: f64,
    /// grams
    pub saturated_fat: f64,
    pub confidence: u8,
    pub ingredients: Vec<Ingredient>,
    pub health_notes: String,
    pub source: AnalysisSource,
}

impl NutritionAnalysis {
    pub fn is_fallback(&self) -> bool {
        self.source == AnalysisSource::Fallback
    }
}

/// One detected component of a meal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ingredient {
    pub name: String,
    pub amount: String,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}
