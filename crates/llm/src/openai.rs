//! OpenAI Provider
//!
//! Chat-completions client for the provider's native endpoint and for any
//! OpenAI-compatible inference gateway. Converts the provider-facing history
//! into wire messages and streams the response as decoded chunks.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use paperdesk_core::ProviderMessage;

use crate::http_client::build_http_client;
use crate::provider::{missing_api_key_error, parse_http_error, ChunkStream, LlmProvider};
use crate::sse::decode_chunk_stream;
use crate::types::{ChatRequest, LlmError, LlmResult, ProviderConfig, ToolDefinition};

/// Sampling temperature for non-reasoning models.
const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Slugs that only accept `max_completion_tokens` and `tools`.
const REASONING_MODELS: &[&str] = &[
    "o1", "o1-mini", "o3", "o3-mini", "o4-mini", "gpt-5", "gpt-5-mini", "gpt-5-nano",
];

const REASONING_PREFIXES: &[&str] = &["o1-", "o3-", "o4-", "gpt-5"];

/// Whether a model slug belongs to the reasoning family.
pub fn is_reasoning_model(slug: &str) -> bool {
    let slug = slug.trim().to_lowercase();
    let slug = slug.rsplit('/').next().unwrap_or(&slug);
    REASONING_MODELS.contains(&slug) || REASONING_PREFIXES.iter().any(|p| slug.starts_with(p))
}

/// OpenAI-compatible provider
pub struct OpenAIProvider {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl OpenAIProvider {
    pub fn new(config: ProviderConfig) -> LlmResult<Self> {
        let client = build_http_client(config.request_timeout)?;
        Ok(Self { config, client })
    }

    /// Reuse an existing connection pool.
    pub fn with_client(config: ProviderConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn api_key(&self) -> LlmResult<&str> {
        self.config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| missing_api_key_error("openai"))
    }

    /// Build the request body for the API
    fn build_request_body(&self, request: &ChatRequest, stream: bool) -> Value {
        let messages: Vec<Value> = request.messages.iter().map(message_to_openai).collect();

        let mut body = json!({
            "model": request.model,
            "messages": messages,
            "stream": stream,
            "store": false,
            "max_completion_tokens": self.config.max_completion_tokens,
        });

        if !request.tools.is_empty() {
            let tools: Vec<Value> = request.tools.iter().map(tool_to_openai).collect();
            body["tools"] = json!(tools);
        }

        if !is_reasoning_model(&request.model) {
            body["temperature"] = json!(DEFAULT_TEMPERATURE);
            if !request.tools.is_empty() {
                body["parallel_tool_calls"] = json!(true);
            }
        }

        if stream {
            body["stream_options"] = json!({ "include_usage": true });
        }

        body
    }

    /// POST the body. Only non-streaming requests carry an overall deadline.
    async fn post(&self, body: &Value, stream: bool) -> LlmResult<reqwest::Response> {
        let api_key = self.api_key()?;
        let url = self.config.chat_completions_url();
        debug!("[Provider] POST {} model={}", url, body["model"]);

        let mut builder = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .header("Content-Type", "application/json")
            .json(body);
        if !stream && !self.config.request_timeout.is_zero() {
            builder = builder.timeout(self.config.request_timeout);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| LlmError::NetworkError {
                message: e.to_string(),
            })?;

        let status = response.status().as_u16();
        if status != 200 {
            let body_text = response.text().await.unwrap_or_default();
            return Err(parse_http_error(status, &body_text, "openai"));
        }
        Ok(response)
    }
}

/// Convert one provider-facing record to the wire format.
pub fn message_to_openai(message: &ProviderMessage) -> Value {
    match message {
        ProviderMessage::System { content, .. } => json!({ "role": "system", "content": content }),
        ProviderMessage::User { content, .. } => json!({ "role": "user", "content": content }),
        ProviderMessage::Assistant { content, .. } => {
            json!({ "role": "assistant", "content": content })
        }
        ProviderMessage::ToolRequest {
            call_id,
            name,
            arguments,
            ..
        } => json!({
            "role": "assistant",
            "content": Value::Null,
            "tool_calls": [{
                "id": call_id,
                "type": "function",
                "function": { "name": name, "arguments": arguments }
            }]
        }),
        ProviderMessage::ToolResult {
            call_id, content, ..
        } => json!({ "role": "tool", "tool_call_id": call_id, "content": content }),
    }
}

/// Convert a ToolDefinition to OpenAI API format
pub fn tool_to_openai(tool: &ToolDefinition) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters
        }
    })
}

#[async_trait]
impl LlmProvider for OpenAIProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn stream_chat(&self, request: &ChatRequest) -> LlmResult<ChunkStream> {
        let body = self.build_request_body(request, true);
        let response = self.post(&body, true).await?;
        Ok(decode_chunk_stream(response.bytes_stream()))
    }

    async fn complete(&self, request: &ChatRequest) -> LlmResult<String> {
        let body = self.build_request_body(request, false);
        let response = self.post(&body, false).await?;
        let body_text = response.text().await.map_err(|e| LlmError::NetworkError {
            message: e.to_string(),
        })?;
        let parsed: CompletionResponse =
            serde_json::from_str(&body_text).map_err(|e| LlmError::ParseError {
                message: format!("Failed to parse response: {}", e),
            })?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::ParseError {
                message: "completion has no content".to_string(),
            })
    }
}

/// Non-streaming response format
#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}
