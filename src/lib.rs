//! Mealgate - resilient meal-photo nutrition analysis
//!
//! This crate sits between an application and two remote services: an
//! OpenAI-compatible vision model that estimates nutrition from meal
//! photos or descriptions, and a meal-tracking REST backend. It provides:
//!
//! - [`CallGateway`]: per-attempt timeout plus bounded exponential-backoff
//!   retry for any outbound call.
//! - [`ResponseCache`]: TTL cache keyed by request [`Fingerprint`] that
//!   also collapses concurrent identical requests into one upstream call.
//! - [`normalize`](analysis::normalize): tolerant parsing of model output
//!   into a canonical [`NutritionAnalysis`].
//! - [`FallbackGenerator`]: plausible synthetic results when analysis fails.
//!
//! # Analysis Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mealgate::{Language, MealAnalyzer};
//! use mealgate::providers::OpenAiClient;
//!
//! #[tokio::main]
//! async fn main() -> mealgate::Result<()> {
//!     let client = OpenAiClient::new("sk-your-key")?;
//!     let analyzer = MealAnalyzer::builder(Arc::new(client)).build();
//!
//!     let analysis = analyzer
//!         .analyze_text("bibimbap with a fried egg", Language::Korean)
//!         .await;
//!
//!     println!("{} kcal ({}% confidence)", analysis.calories, analysis.confidence);
//!     Ok(())
//! }
//! ```
//!
//! # Fallback Example
//!
//! ```rust
//! use mealgate::{FallbackGenerator, Language};
//!
//! let generator = FallbackGenerator::seeded(7);
//! let analysis = generator.generate(Language::English, None);
//! assert!((300.0..=700.0).contains(&analysis.calories));
//! assert_eq!(analysis.confidence, 65);
//! ```

pub mod analysis;
pub mod analyzer;
pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod providers;
pub mod telemetry;
pub mod types;

// Re-export main types at crate root
pub use analysis::FallbackGenerator;
pub use analyzer::{MealAnalyzer, MealAnalyzerBuilder};
pub use backend::{BackendClient, SessionEvent, TokenManager};
pub use cache::{CacheConfig, Fingerprint, ResponseCache};
pub use config::{Config, Secrets};
pub use error::{ErrorKind, MealgateError, Result};
pub use gateway::{CallGateway, RetryConfig};

pub use types::{
    AnalysisSource, ImageInput, Ingredient, Language, Message, MessageContent,
    NutritionAnalysis, Role,
};

/// Package version from Cargo.toml.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");
