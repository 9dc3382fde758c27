//! Analysis result handling: normalization of model output and the
//! synthetic fallback used when no usable output exists.

pub mod fallback;
pub mod normalize;

pub use fallback::{FALLBACK_CALORIES, FallbackGenerator};
pub use normalize::{coerce_number, extract_json, normalize, parse_analysis};
