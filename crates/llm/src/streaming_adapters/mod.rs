//! Provider Stream Adapters
//!
//! Turn decoded provider chunks into client stream events.

pub mod chat_completions;

pub use chat_completions::{
    is_complete_arguments, AssistantSegment, ChatCompletionsDemuxer, FinishedToolCall, TurnOutput,
};
