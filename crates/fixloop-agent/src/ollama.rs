use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

use fixloop_core::{FixRequest, Generator, GeneratorError, GeneratorResponse};

use crate::prompt::PromptBuilder;
use crate::response::parse_response;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434/api/chat";

/// Context window requested from the server
const NUM_CTX: u32 = 32_000;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    format: serde_json::Value,
    options: ChatOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    think: Option<bool>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    num_ctx: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

/// [`Generator`] that calls an Ollama chat endpoint with a JSON schema
pub struct OllamaGenerator {
    client: reqwest::Client,
    url: String,
    model: String,
    timeout: Option<Duration>,
    prompt: PromptBuilder,
}

impl OllamaGenerator {
    pub fn new(
        url: impl Into<String>,
        model: impl Into<String>,
        timeout: Option<Duration>,
        prompt: PromptBuilder,
    ) -> Result<Self, GeneratorError> {
        let mut builder = reqwest::Client::builder();
        if let Some(limit) = timeout {
            builder = builder.timeout(limit);
        }
        let client = builder
            .build()
            .map_err(|e| GeneratorError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
            model: model.into(),
            timeout,
            prompt,
        })
    }

    /// Reasoning models accept the `think` flag
    fn is_reasoning_model(&self) -> bool {
        self.model.starts_with("deepseek-r1")
    }

    fn response_schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "code": { "type": "string" },
                "diagnosis": { "type": "string" }
            },
            "required": ["code"]
        })
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn name(&self) -> &str {
        "Ollama"
    }

    async fn propose(&self, request: FixRequest<'_>) -> Result<GeneratorResponse, GeneratorError> {
        let user = self.prompt.render(&request);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: self.prompt.system_message(),
                },
                ChatMessage {
                    role: "user",
                    content: &user,
                },
            ],
            stream: false,
            format: Self::response_schema(),
            options: ChatOptions { num_ctx: NUM_CTX },
            think: self.is_reasoning_model().then_some(true),
        };

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| match self.timeout {
                Some(limit) if e.is_timeout() => GeneratorError::Timeout(limit),
                _ if e.is_connect() => GeneratorError::Unavailable(e.to_string()),
                _ => GeneratorError::Failed(e.to_string()),
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GeneratorError::Failed(e.to_string()))?;

        if !status.is_success() {
            return Err(GeneratorError::Failed(format!("HTTP {}: {}", status, text)));
        }

        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| GeneratorError::Failed(format!("Invalid Ollama response: {}", e)))?;
        let content = parsed.message.map(|m| m.content).unwrap_or_default();

        if content.trim().is_empty() {
            debug!(model = %self.model, "Empty response from Ollama");
            return Ok(GeneratorResponse::NoResponse);
        }
        if content.ends_with("...") {
            warn!(model = %self.model, "Ollama response appears truncated");
            return Ok(GeneratorResponse::NoResponse);
        }

        Ok(parse_response(&content))
    }
}
