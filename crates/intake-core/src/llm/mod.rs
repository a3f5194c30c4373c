//! Language model capability used by the guardrail and the extractor.
//!
//! The pipeline only ever sees the [`LanguageModel`] trait, so tests can
//! script responses without a network and the HTTP client stays a detail.

mod openai;

pub use openai::OpenAiClient;

use std::future::Future;

use serde_json::Value;

use crate::error::ModelError;

/// One piece of user content sent with a request.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart {
    /// Plain text.
    Text(String),
    /// An image as a `data:` URL.
    ImageUrl(String),
}

/// Structured output contract for a response.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSchema {
    /// Schema name reported to the model.
    pub name: String,
    /// JSON Schema the response must satisfy.
    pub schema: Value,
}

/// A single-turn structured completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    /// Model identifier.
    pub model: String,
    /// System instructions.
    pub instructions: String,
    /// User content, in order.
    pub parts: Vec<ContentPart>,
    /// Required response shape.
    pub schema: ResponseSchema,
}

impl ModelRequest {
    /// Number of image parts.
    pub fn image_count(&self) -> usize {
        self.parts
            .iter()
            .filter(|p| matches!(p, ContentPart::ImageUrl(_)))
            .count()
    }
}

/// A model that turns a request into a JSON document, reporting text
/// fragments through `on_delta` as they arrive.
pub trait LanguageModel: Send + Sync {
    /// Run the request once and return the complete response text.
    fn complete(
        &self,
        request: &ModelRequest,
        on_delta: &mut (dyn FnMut(&str) + Send),
    ) -> impl Future<Output = Result<String, ModelError>> + Send;
}
