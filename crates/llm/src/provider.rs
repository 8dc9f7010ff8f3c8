//! LLM Provider Trait
//!
//! The interface the orchestrator drives, plus endpoint selection: a user's
//! own API key routes to the provider's native endpoint, everyone else goes
//! through the configured inference gateway.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::Stream;

use paperdesk_core::ProviderMessage;

use crate::openai::OpenAIProvider;
use crate::types::{ChatChunk, ChatRequest, LlmError, LlmResult, ProviderConfig, DEFAULT_OPENAI_BASE_URL};

/// Decoded chunks of one streaming completion.
pub type ChunkStream = Pin<Box<dyn Stream<Item = LlmResult<ChatChunk>> + Send>>;

/// Prompt of the startup sanity ping.
pub const PING_PROMPT: &str = "say 'client works'";

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Returns the provider name for identification.
    fn name(&self) -> &'static str;

    /// Start a streaming completion.
    async fn stream_chat(&self, request: &ChatRequest) -> LlmResult<ChunkStream>;

    /// Run a non-streaming completion and return the assistant text.
    async fn complete(&self, request: &ChatRequest) -> LlmResult<String>;

    /// Sanity ping used at startup.
    async fn ping(&self, model: &str) -> LlmResult<String> {
        let request = ChatRequest::new(
            model,
            vec![ProviderMessage::User {
                message_id: "user_ping".to_string(),
                content: PING_PROMPT.to_string(),
            }],
        );
        self.complete(&request).await
    }
}

// ============================================================================
// Endpoint selection
// ============================================================================

/// The two endpoints a provider client can be built for.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderEndpoints {
    pub gateway_base_url: String,
    pub gateway_api_key: Option<String>,
    pub openai_base_url: String,
    pub max_completion_tokens: u32,
    pub request_timeout: Duration,
}

impl Default for ProviderEndpoints {
    fn default() -> Self {
        Self {
            gateway_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            gateway_api_key: None,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            max_completion_tokens: crate::types::DEFAULT_MAX_COMPLETION_TOKENS,
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl ProviderEndpoints {
    /// Pick endpoint and credentials for a user.
    pub fn select(&self, user_api_key: Option<&str>) -> ProviderConfig {
        let user_key = user_api_key.map(str::trim).filter(|k| !k.is_empty());
        let (base_url, api_key) = match user_key {
            Some(key) => (self.openai_base_url.clone(), Some(key.to_string())),
            None => (self.gateway_base_url.clone(), self.gateway_api_key.clone()),
        };
        ProviderConfig {
            base_url,
            api_key,
            max_completion_tokens: self.max_completion_tokens,
            request_timeout: self.request_timeout,
        }
    }
}

/// Builds provider clients per request.
pub trait ProviderFactory: Send + Sync {
    fn create(&self, user_api_key: Option<&str>) -> LlmResult<Arc<dyn LlmProvider>>;
}

/// Factory for OpenAI-compatible endpoints. Shares one HTTP connection pool.
pub struct OpenAIProviderFactory {
    endpoints: ProviderEndpoints,
    client: reqwest::Client,
}

impl OpenAIProviderFactory {
    pub fn new(endpoints: ProviderEndpoints) -> LlmResult<Self> {
        let client = crate::http_client::build_http_client(endpoints.request_timeout)?;
        Ok(Self { endpoints, client })
    }

    pub fn endpoints(&self) -> &ProviderEndpoints {
        &self.endpoints
    }
}

impl ProviderFactory for OpenAIProviderFactory {
    fn create(&self, user_api_key: Option<&str>) -> LlmResult<Arc<dyn LlmProvider>> {
        let config = self.endpoints.select(user_api_key);
        Ok(Arc::new(OpenAIProvider::with_client(config, self.client.clone())))
    }
}

// ============================================================================
// Error helpers
// ============================================================================

/// Helper function to create an error for missing API key
pub fn missing_api_key_error(provider: &str) -> LlmError {
    LlmError::AuthenticationFailed {
        message: format!("API key not configured for {}", provider),
    }
}

/// Helper function to parse HTTP error status codes
pub fn parse_http_error(status: u16, body: &str, provider: &str) -> LlmError {
    match status {
        401 => LlmError::AuthenticationFailed {
            message: format!("{}: Invalid API key", provider),
        },
        403 => LlmError::AuthenticationFailed {
            message: format!("{}: Access denied", provider),
        },
        404 => LlmError::ModelNotFound {
            model: body.to_string(),
        },
        429 => LlmError::RateLimited {
            message: body.to_string(),
        },
        400 => LlmError::InvalidRequest {
            message: body.to_string(),
        },
        500..=599 => LlmError::ServerError {
            message: body.to_string(),
            status: Some(status),
        },
        _ => LlmError::Other {
            message: format!("HTTP {}: {}", status, body),
        },
    }
}
