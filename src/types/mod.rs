//! Public types for the Mealgate API.

mod analysis;
mod language;
mod message;

pub use analysis::{
    AnalysisSource, DEFAULT_CONFIDENCE, FALLBACK_CONFIDENCE, Ingredient, MAX_CONFIDENCE,
    MIN_CONFIDENCE, NutritionAnalysis,
};
pub use language::Language;
pub use message::{ContentPart, ImageInput, ImageUrl, Message, MessageContent, Role};
