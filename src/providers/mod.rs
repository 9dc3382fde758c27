//! Upstream model providers.

pub mod openai;
pub mod traits;

pub use openai::OpenAiClient;
pub use traits::{CompletionProvider, CompletionRequest};
