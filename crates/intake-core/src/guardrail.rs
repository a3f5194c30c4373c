//! Input safety check run before any extraction work.

use std::future::Future;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::error::ModelError;
use crate::llm::{ContentPart, LanguageModel, ModelRequest, ResponseSchema};

const GUARDRAIL_INSTRUCTIONS: &str = "\
Check if the input is asking about inappropriate content. \
Set is_safe to false if it is, true otherwise, and explain the decision briefly in reasoning.
";

/// Classifier decision. `is_safe == false` trips the guardrail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GuardrailVerdict {
    pub is_safe: bool,
    pub reasoning: String,
}

impl GuardrailVerdict {
    pub fn safe(reasoning: impl Into<String>) -> Self {
        Self {
            is_safe: true,
            reasoning: reasoning.into(),
        }
    }

    pub fn unsafe_because(reasoning: impl Into<String>) -> Self {
        Self {
            is_safe: false,
            reasoning: reasoning.into(),
        }
    }
}

/// A safety classifier over the inbound request.
pub trait Guardrail: Send + Sync {
    fn check(&self, input: &str) -> impl Future<Output = Result<GuardrailVerdict, ModelError>> + Send;
}

/// Text the guardrail inspects: the inbound email itself.
pub fn guardrail_input(subject: &str, body: &str) -> String {
    format!("Email Subject: {}\nEmail Body: {}\n", subject, body)
}

/// Guardrail backed by a language model with a strict verdict schema.
pub struct ModelGuardrail<M> {
    model: M,
    model_name: String,
}

impl<M: LanguageModel> ModelGuardrail<M> {
    pub fn new(model: M, model_name: impl Into<String>) -> Self {
        Self {
            model,
            model_name: model_name.into(),
        }
    }

    fn request(&self, input: &str) -> ModelRequest {
        ModelRequest {
            model: self.model_name.clone(),
            instructions: GUARDRAIL_INSTRUCTIONS.to_string(),
            parts: vec![ContentPart::Text(input.to_string())],
            schema: ResponseSchema {
                name: "GuardrailOutput".to_string(),
                schema: json!({
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["is_safe", "reasoning"],
                    "properties": {
                        "is_safe": { "type": "boolean" },
                        "reasoning": { "type": "string" }
                    }
                }),
            },
        }
    }
}

impl<M: LanguageModel> Guardrail for ModelGuardrail<M> {
    async fn check(&self, input: &str) -> Result<GuardrailVerdict, ModelError> {
        let raw = self
            .model
            .complete(&self.request(input), &mut |_: &str| {})
            .await?;

        let verdict: GuardrailVerdict =
            serde_json::from_str(raw.trim()).map_err(|e| ModelError::Guardrail(e.to_string()))?;
        debug!("Guardrail verdict: safe={} ({})", verdict.is_safe, verdict.reasoning);
        Ok(verdict)
    }
}
