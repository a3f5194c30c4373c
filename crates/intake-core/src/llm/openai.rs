//! Streaming client for OpenAI-compatible chat completion endpoints.

use std::time::Duration;

use futures_util::StreamExt;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, trace};

use super::{ContentPart, LanguageModel, ModelRequest};
use crate::error::ModelError;
use crate::models::config::ModelConfig;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat<'a>,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: MessageContent<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent<'a> {
    Text(&'a str),
    Parts(Vec<Part<'a>>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Part<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl<'a> },
}

#[derive(Serialize)]
struct ImageUrl<'a> {
    url: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    format_type: &'static str,
    json_schema: JsonSchemaFormat<'a>,
}

#[derive(Serialize)]
struct JsonSchemaFormat<'a> {
    name: &'a str,
    strict: bool,
    schema: &'a Value,
}

/// One parsed server-sent event line.
#[derive(Debug, PartialEq)]
enum SseLine {
    Delta(String),
    Done,
    Skip,
}

/// Client for `/chat/completions` with streamed structured output.
#[derive(Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, ModelError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// Build a client, reading the API key from the configured variable.
    pub fn from_config(config: &ModelConfig) -> Result<Self, ModelError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ModelError::MissingApiKey(config.api_key_env.clone()))?;

        Self::new(&config.base_url, api_key)
    }
}

fn build_body(request: &ModelRequest) -> ChatRequest<'_> {
    let parts = request
        .parts
        .iter()
        .map(|part| match part {
            ContentPart::Text(text) => Part::Text { text },
            ContentPart::ImageUrl(url) => Part::ImageUrl {
                image_url: ImageUrl { url },
            },
        })
        .collect();

    ChatRequest {
        model: &request.model,
        messages: vec![
            ChatMessage {
                role: "system",
                content: MessageContent::Text(&request.instructions),
            },
            ChatMessage {
                role: "user",
                content: MessageContent::Parts(parts),
            },
        ],
        response_format: ResponseFormat {
            format_type: "json_schema",
            json_schema: JsonSchemaFormat {
                name: &request.schema.name,
                strict: true,
                schema: &request.schema.schema,
            },
        },
        stream: true,
    }
}

fn parse_sse_line(line: &str) -> Result<SseLine, ModelError> {
    let line = line.trim();
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(SseLine::Skip);
    };

    let data = data.trim();
    if data == "[DONE]" {
        return Ok(SseLine::Done);
    }

    let v: Value = serde_json::from_str(data).map_err(|e| ModelError::Stream(e.to_string()))?;

    if let Some(err) = v.get("error") {
        let message = err
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown error");
        return Err(ModelError::Stream(message.to_string()));
    }

    // choices[0].delta.content; role and tool deltas carry no text
    let content = v
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c0| c0.get("delta"))
        .and_then(|d| d.get("content"))
        .and_then(|c| c.as_str())
        .unwrap_or_default();

    if content.is_empty() {
        Ok(SseLine::Skip)
    } else {
        Ok(SseLine::Delta(content.to_string()))
    }
}

impl LanguageModel for OpenAiClient {
    async fn complete(
        &self,
        request: &ModelRequest,
        on_delta: &mut (dyn FnMut(&str) + Send),
    ) -> Result<String, ModelError> {
        debug!(
            "Requesting {} with {} part(s), {} image(s)",
            request.model,
            request.parts.len(),
            request.image_count()
        );

        let resp = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&build_body(request))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ModelError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let mut stream = resp.bytes_stream();
        let mut buf: Vec<u8> = Vec::new();
        let mut output = String::new();

        'read: while let Some(chunk) = stream.next().await {
            buf.extend_from_slice(&chunk?);

            // Only decode complete lines so multi-byte characters never split
            while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buf.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&line);

                match parse_sse_line(&line)? {
                    SseLine::Delta(text) => {
                        on_delta(&text);
                        output.push_str(&text);
                    }
                    SseLine::Done => break 'read,
                    SseLine::Skip => {}
                }
            }
        }

        trace!("Model response: {}", output);

        if output.trim().is_empty() {
            return Err(ModelError::EmptyResponse);
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ResponseSchema;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_parse_delta() {
        let line = r#"data: {"choices":[{"index":0,"delta":{"content":"{\"invoice"}}]}"#;
        assert_eq!(
            parse_sse_line(line).unwrap(),
            SseLine::Delta("{\"invoice".to_string())
        );
    }

    #[test]
    fn test_parse_done_and_noise() {
        assert_eq!(parse_sse_line("data: [DONE]").unwrap(), SseLine::Done);
        assert_eq!(parse_sse_line(": keep-alive").unwrap(), SseLine::Skip);
        assert_eq!(
            parse_sse_line(r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#).unwrap(),
            SseLine::Skip
        );
    }

    #[test]
    fn test_parse_stream_error() {
        let err = parse_sse_line(r#"data: {"error":{"message":"rate limited"}}"#).unwrap_err();
        assert!(err.to_string().contains("rate limited"));
    }

    #[test]
    fn test_request_body_shape() {
        let request = ModelRequest {
            model: "gpt-5-mini".to_string(),
            instructions: "Extract.".to_string(),
            parts: vec![
                ContentPart::Text("Email Subject: hi".to_string()),
                ContentPart::ImageUrl("data:image/png;base64,AAAA".to_string()),
            ],
            schema: ResponseSchema {
                name: "Invoice".to_string(),
                schema: json!({"type": "object"}),
            },
        };

        let body = serde_json::to_value(build_body(&request)).unwrap();
        assert_eq!(
            body,
            json!({
                "model": "gpt-5-mini",
                "messages": [
                    {"role": "system", "content": "Extract."},
                    {"role": "user", "content": [
                        {"type": "text", "text": "Email Subject: hi"},
                        {"type": "image_url", "image_url": {"url": "data:image/png;base64,AAAA"}}
                    ]}
                ],
                "response_format": {
                    "type": "json_schema",
                    "json_schema": {"name": "Invoice", "strict": true, "schema": {"type": "object"}}
                },
                "stream": true
            })
        );
    }

    #[test]
    fn test_missing_api_key() {
        let config = ModelConfig {
            api_key_env: "INTAKE_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..ModelConfig::default()
        };
        assert!(matches!(
            OpenAiClient::from_config(&config),
            Err(ModelError::MissingApiKey(_))
        ));
    }
}
