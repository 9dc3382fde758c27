//! Instruction text sent with analysis requests.

use crate::types::{Language, NutritionAnalysis};

const SCHEMA: &str = r#"{"foodName": string, "servingSize": string, "cookingMethod": string,
"calories": number, "protein": number, "carbs": number, "fat": number, "fiber": number,
"sugar": number, "sodium": number, "cholesterol": number, "saturatedFat": number,
"confidence": number (1-100),
"ingredients": [{"name": string, "amount": string, "calories": number, "protein": number, "carbs": number, "fat": number}],
"healthNotes": string}"#;

pub(crate) fn system(language: Language) -> String {
    format!(
        "You are a nutrition analyst. Estimate the nutrition of the meal you are given. \
         Reply with a single JSON object matching this shape and nothing else:\n{SCHEMA}\n\
         Use grams for macronutrients and milligrams for sodium and cholesterol. \
         Write all text values in {}.",
        language.display_name()
    )
}

pub(crate) fn image_request() -> &'static str {
    "Analyze the meal in this photo."
}

pub(crate) fn text_request(description: &str) -> String {
    format!("Analyze this meal: {description}")
}

pub(crate) fn update_request(previous: &NutritionAnalysis, update_text: &str) -> String {
    let previous = serde_json::to_string(previous).unwrap_or_default();
    format!(
        "A previous analysis of this meal was:\n{previous}\n\
         The user corrected it with: \"{update_text}\"\n\
         Return the full corrected analysis."
    )
}
