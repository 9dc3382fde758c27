//! Turn free-form model output into a [`NutritionAnalysis`].
//!
//! Two stages:
//!
//! 1. [`extract_json()`] finds a JSON object inside arbitrary text. It
//!    tolerates prose or code fences around the payload, trailing commas,
//!    and output truncated mid-object (the common failure when a model hits
//!    its token limit).
//! 2. [`normalize()`] reads each known field leniently. Numbers may arrive
//!    as numbers or numeric strings (`"450"`, `"450 kcal"`, `"1,200"`);
//!    anything unusable falls back to the field default.

use serde_json::{Map, Value};

use crate::types::{
    AnalysisSource, DEFAULT_CONFIDENCE, Ingredient, Language, MAX_CONFIDENCE, MIN_CONFIDENCE,
    NutritionAnalysis,
};
use crate::{MealgateError, Result};

/// Keys of nested objects that may hold the nutrient fields.
const NESTED_KEYS: &[&str] = &[
    "nutrition",
    "nutrients",
    "nutritionInfo",
    "nutrition_info",
    "macros",
];

/// Extract and normalize an analysis from raw model text.
///
/// Fails with [`MealgateError::ParseFailed`] when no JSON object can be
/// recovered from `text`.
pub fn parse_analysis(text: &str, language: Language) -> Result<NutritionAnalysis> {
    let value = extract_json(text).ok_or_else(|| {
        MealgateError::ParseFailed("no JSON object found in model response".to_string())
    })?;
    Ok(normalize(&value, language))
}

/// Best-effort extraction of the first JSON object embedded in `text`.
///
/// Every `{` is tried as a candidate start until one yields an object.
pub fn extract_json(text: &str) -> Option<Value> {
    text.match_indices('{')
        .find_map(|(start, _)| extract_at(&text[start..]))
}

fn extract_at(candidate: &str) -> Option<Value> {
    let scan = Scan::run(candidate);
    match scan.end {
        Some(end) => {
            let object = &candidate[..end];
            parse_object(object).or_else(|| parse_object(&strip_trailing_commas(object)))
        }
        None => salvage(candidate, &scan),
    }
}

fn parse_object(s: &str) -> Option<Value> {
    serde_json::from_str::<Value>(s).ok().filter(Value::is_object)
}

/// Structural scan of a candidate that starts at `{`.
struct Scan {
    /// Byte offset just past the matching `}`, if the object is complete.
    end: Option<usize>,
    /// Closers still owed at the end of input.
    open: Vec<char>,
    in_string: bool,
    /// Last top-level-or-nested `,` outside a string with the closers owed
    /// at that point.
    last_comma: Option<(usize, Vec<char>)>,
}

impl Scan {
    fn run(s: &str) -> Self {
        let mut open = Vec::new();
        let mut in_string = false;
        let mut escaped = false;
        let mut last_comma = None;

        for (i, c) in s.char_indices() {
            if in_string {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == '"' {
                    in_string = false;
                }
                continue;
            }
            match c {
                '"' => in_string = true,
                '{' => open.push('}'),
                '[' => open.push(']'),
                '}' | ']' => {
                    open.pop();
                    if open.is_empty() {
                        return Self {
                            end: Some(i + 1),
                            open,
                            in_string,
                            last_comma,
                        };
                    }
                }
                ',' => last_comma = Some((i, open.clone())),
                _ => {}
            }
        }

        Self {
            end: None,
            open,
            in_string,
            last_comma,
        }
    }
}

/// Repair a truncated object.
///
/// First closes whatever is open at the end of input. If that is not valid
/// JSON (e.g. the cut fell inside a key or a literal), cuts back to the
/// last complete member instead.
fn salvage(candidate: &str, scan: &Scan) -> Option<Value> {
    let mut repaired = candidate.trim_end().to_string();
    if scan.in_string {
        repaired.push('"');
    }
    let trimmed = repaired.trim_end().trim_end_matches(',').trim_end();
    let mut repaired = trimmed.to_string();
    if repaired.ends_with(':') {
        repaired.push_str("null");
    }
    repaired.extend(scan.open.iter().rev());
    if let Some(value) = parse_object(&strip_trailing_commas(&repaired)) {
        return Some(value);
    }

    let (cut, open) = scan.last_comma.as_ref()?;
    let mut repaired = candidate[..*cut].to_string();
    repaired.extend(open.iter().rev());
    parse_object(&strip_trailing_commas(&repaired))
}

/// Drop commas directly followed (modulo whitespace) by `}` or `]`.
fn strip_trailing_commas(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut chars = s.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            out.push(c);
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                let rest = s[i + 1..].trim_start();
                if !(rest.starts_with('}') || rest.starts_with(']')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Normalize a loosely-typed analysis object.
///
/// Never fails: missing or unusable fields take their defaults (0 for
/// nutrients, locale placeholders for names, [`DEFAULT_CONFIDENCE`] for a
/// missing confidence).
pub fn normalize(raw: &Value, language: Language) -> NutritionAnalysis {
    let fields = Fields::new(raw);
    NutritionAnalysis {
        food_name: fields
            .text(&["foodName", "food_name", "name", "dish", "mealName"])
            .unwrap_or_else(|| language.unknown_food().to_string()),
        serving_size: fields
            .text(&["servingSize", "serving_size", "serving", "portion"])
            .unwrap_or_else(|| language.default_serving().to_string()),
        cooking_method: fields
            .text(&["cookingMethod", "cooking_method", "preparation"])
            .unwrap_or_else(|| language.unknown_cooking_method().to_string()),
        calories: fields.quantity(&["calories", "kcal", "energy"]),
        protein: fields.quantity(&["protein", "proteins"]),
        carbs: fields.quantity(&["carbs", "carbohydrates", "carbohydrate"]),
        fat: fields.quantity(&["fat", "fats", "totalFat", "total_fat"]),
        fiber: fields.quantity(&["fiber", "fibre", "dietaryFiber", "dietary_fiber"]),
        sugar: fields.quantity(&["sugar", "sugars"]),
        sodium: fields.quantity(&["sodium"]),
        cholesterol: fields.quantity(&["cholesterol"]),
        saturated_fat: fields.quantity(&["saturatedFat", "saturated_fat"]),
        confidence: confidence(fields.value(&["confidence", "confidenceScore", "confidence_score"])),
        ingredients: ingredients(raw, language),
        health_notes: fields
            .text(&["healthNotes", "health_notes", "healthAdvice", "health_advice", "notes"])
            .unwrap_or_default(),
        source: AnalysisSource::Model,
    }
}

/// Field lookup across the root object and known nested nutrient objects.
struct Fields<'a> {
    scopes: Vec<&'a Map<String, Value>>,
}

impl<'a> Fields<'a> {
    fn new(raw: &'a Value) -> Self {
        let mut scopes = Vec::new();
        if let Some(root) = raw.as_object() {
            scopes.push(root);
            scopes.extend(
                NESTED_KEYS
                    .iter()
                    .filter_map(|k| root.get(*k).and_then(Value::as_object)),
            );
        }
        Self { scopes }
    }

    fn value(&self, keys: &[&str]) -> Option<&'a Value> {
        self.scopes.iter().find_map(|scope| {
            keys.iter()
                .find_map(|k| scope.get(*k).filter(|v| !v.is_null()))
        })
    }

    fn quantity(&self, keys: &[&str]) -> f64 {
        self.value(keys).and_then(coerce_quantity).unwrap_or(0.0)
    }

    fn text(&self, keys: &[&str]) -> Option<String> {
        self.value(keys).and_then(coerce_text)
    }
}

/// Numeric value of a JSON number or numeric string.
///
/// Strings may carry a unit suffix and thousands separators. Booleans,
/// arrays and objects are not numbers.
pub fn coerce_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => parse_leading_number(s)?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn coerce_quantity(value: &Value) -> Option<f64> {
    coerce_number(value).filter(|n| *n >= 0.0)
}

fn parse_leading_number(s: &str) -> Option<f64> {
    let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
    let end = cleaned
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || c == '.' || (i == 0 && (c == '-' || c == '+'))))
        .map_or(cleaned.len(), |(i, _)| i);
    cleaned[..end].parse().ok()
}

fn coerce_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Clamp a provided confidence into range; default when absent or unusable.
fn confidence(value: Option<&Value>) -> u8 {
    match value.and_then(coerce_number) {
        Some(n) => n
            .round()
            .clamp(f64::from(MIN_CONFIDENCE), f64::from(MAX_CONFIDENCE)) as u8,
        None => DEFAULT_CONFIDENCE,
    }
}

fn ingredients(raw: &Value, language: Language) -> Vec<Ingredient> {
    let Some(items) = ["ingredients", "items", "components"]
        .iter()
        .find_map(|k| raw.get(*k).and_then(Value::as_array))
    else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match item {
            Value::String(name) if !name.trim().is_empty() => Some(Ingredient {
                name: name.trim().to_string(),
                amount: language.default_serving().to_string(),
                calories: 0.0,
                protein: 0.0,
                carbs: 0.0,
                fat: 0.0,
            }),
            Value::Object(_) => {
                let fields = Fields::new(item);
                Some(Ingredient {
                    name: fields
                        .text(&["name", "ingredient", "foodName", "food_name"])
                        .unwrap_or_else(|| language.unknown_food().to_string()),
                    amount: fields
                        .text(&["amount", "quantity", "portion", "servingSize", "serving_size"])
                        .unwrap_or_else(|| language.default_serving().to_string()),
                    calories: fields.quantity(&["calories", "kcal"]),
                    protein: fields.quantity(&["protein"]),
                    carbs: fields.quantity(&["carbs", "carbohydrates"]),
                    fat: fields.quantity(&["fat"]),
                })
            }
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_object_wrapped_in_prose() {
        let text = "Sure! Here is the analysis:\n```json\n{\"calories\": 420}\n```\nEnjoy.";
        assert_eq!(extract_json(text), Some(json!({"calories": 420})));
    }

    #[test]
    fn braces_inside_strings_do_not_end_the_object() {
        let text = r#"{"foodName": "curly } pasta {", "calories": 10}"#;
        let value = extract_json(text).unwrap();
        assert_eq!(value["foodName"], "curly } pasta {");
    }

    #[test]
    fn skips_non_json_braces_before_payload() {
        let text = r#"Use {placeholder} style. {"calories": 5}"#;
        assert_eq!(extract_json(text), Some(json!({"calories": 5})));
    }

    #[test]
    fn removes_trailing_commas() {
        let text = r#"{"calories": 300, "ingredients": ["rice", "egg",],}"#;
        let value = extract_json(text).unwrap();
        assert_eq!(value["ingredients"], json!(["rice", "egg"]));
    }

    #[test]
    fn salvages_object_truncated_inside_value_string() {
        let text = r#"{"calories": 510, "foodName": "Bibimb"#;
        let value = extract_json(text).unwrap();
        assert_eq!(value["calories"], 510);
        assert_eq!(value["foodName"], "Bibimb");
    }

    #[test]
    fn salvages_object_truncated_inside_key() {
        let text = r#"{"calories": 510, "prot"#;
        assert_eq!(extract_json(text), Some(json!({"calories": 510})));
    }

    #[test]
    fn salvages_nested_truncation() {
        let text = r#"{"calories": 600, "ingredients": [{"name": "rice", "calories": 200}, {"name": "be"#;
        let value = extract_json(text).unwrap();
        assert_eq!(value["calories"], 600);
        assert!(value["ingredients"].as_array().is_some());
    }

    #[test]
    fn dangling_key_becomes_null() {
        let text = r#"{"calories": 100, "protein":"#;
        let value = extract_json(text).unwrap();
        assert_eq!(value["calories"], 100);
        assert!(value["protein"].is_null());
    }

    #[test]
    fn no_object_yields_none() {
        assert_eq!(extract_json("I cannot analyze this image."), None);
        assert_eq!(extract_json("[1, 2, 3]"), None);
    }

    #[test]
    fn numeric_strings_are_coerced() {
        assert_eq!(coerce_number(&json!("450")), Some(450.0));
        assert_eq!(coerce_number(&json!("450 kcal")), Some(450.0));
        assert_eq!(coerce_number(&json!("12.5g")), Some(12.5));
        assert_eq!(coerce_number(&json!("1,200")), Some(1200.0));
        assert_eq!(coerce_number(&json!("about 3")), None);
        assert_eq!(coerce_number(&json!(true)), None);
    }

    #[test]
    fn confidence_clamps_and_defaults() {
        assert_eq!(confidence(Some(&json!(150))), 100);
        assert_eq!(confidence(Some(&json!(-4))), 1);
        assert_eq!(confidence(Some(&json!("88"))), 88);
        assert_eq!(confidence(Some(&json!("high"))), DEFAULT_CONFIDENCE);
        assert_eq!(confidence(None), DEFAULT_CONFIDENCE);
    }

    #[test]
    fn nested_nutrition_object_is_consulted() {
        let raw = json!({"foodName": "Ramen", "nutrition": {"calories": 520, "sodium": "1800mg"}});
        let a = normalize(&raw, Language::English);
        assert_eq!(a.calories, 520.0);
        assert_eq!(a.sodium, 1800.0);
    }

    #[test]
    fn negative_quantities_become_zero() {
        let a = normalize(&json!({"fat": -3}), Language::English);
        assert_eq!(a.fat, 0.0);
    }
}
