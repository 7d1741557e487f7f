//! Transformation request service.

mod gemini;
mod payload;
mod provider;

pub use gemini::{GeminiModel, GeminiTransformer, GeminiTransformerBuilder, DEFAULT_BASE_URL};
pub use payload::InlinePayload;
pub use provider::TransformProvider;
