//! PaperDesk LLM
//!
//! Chat-completion plumbing for the conversation backend:
//! - provider endpoint selection and the OpenAI-compatible client
//! - SSE decoding of streaming responses
//! - the chunk demultiplexer that turns provider chunks into client parts

pub mod http_client;
pub mod openai;
pub mod provider;
pub mod sse;
pub mod streaming_adapters;
pub mod types;

// Re-export main types
pub use http_client::build_http_client;
pub use openai::{is_reasoning_model, OpenAIProvider};
pub use provider::{
    ChunkStream, LlmProvider, OpenAIProviderFactory, ProviderEndpoints, ProviderFactory,
    PING_PROMPT,
};
pub use sse::{decode_chunk_stream, SseLineDecoder};
pub use streaming_adapters::{AssistantSegment, ChatCompletionsDemuxer, FinishedToolCall, TurnOutput};
pub use types::*;
