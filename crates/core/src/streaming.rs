//! Client Stream Events
//!
//! The ordered event vocabulary a conversation turn emits to the client.
//! Events are produced by the chunk demultiplexer and the orchestrator and
//! framed by the HTTP layer as server-sent events.

use serde::{Deserialize, Serialize};

/// Kind of a streamed part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartKind {
    Assistant,
    Reasoning,
    ToolCallPrepare,
}

/// Final content of a part, carried by `StreamPartEnd`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PartPayload {
    Assistant {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reasoning: Option<String>,
    },
    Reasoning {
        content: String,
    },
    ToolCallPrepare {
        call_id: String,
        name: String,
        arguments: String,
    },
}

/// Lifecycle phase of a tool execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallPhase {
    Started,
    Finished,
}

/// One event of a conversation turn stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Always first; tells the client which conversation the turn belongs to
    StreamInitialization {
        conversation_id: String,
        model_slug: String,
    },

    /// A new assistant message, reasoning block or tool-call-prepare block
    StreamPartBegin { message_id: String, kind: PartKind },

    /// A text or reasoning fragment
    MessageChunk { message_id: String, delta: String },

    /// The provider finished a part
    StreamPartEnd {
        message_id: String,
        kind: PartKind,
        payload: PartPayload,
    },

    /// Emitted when a tool starts and again when it finishes
    ToolCall {
        message_id: String,
        phase: ToolCallPhase,
        name: String,
        args: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// The provider stopped early (length limit, content filter)
    IncompleteIndicator { reason: String, response_id: String },

    /// A fatal error ended the turn
    StreamError { kind: String, message: String },

    /// Always last, including after errors
    StreamFinalization { conversation_id: String },
}

impl StreamEvent {
    /// Snake-case event name used for SSE framing.
    pub fn event_name(&self) -> &'static str {
        match self {
            StreamEvent::StreamInitialization { .. } => "stream_initialization",
            StreamEvent::StreamPartBegin { .. } => "stream_part_begin",
            StreamEvent::MessageChunk { .. } => "message_chunk",
            StreamEvent::StreamPartEnd { .. } => "stream_part_end",
            StreamEvent::ToolCall { .. } => "tool_call",
            StreamEvent::IncompleteIndicator { .. } => "incomplete_indicator",
            StreamEvent::StreamError { .. } => "stream_error",
            StreamEvent::StreamFinalization { .. } => "stream_finalization",
        }
    }

    /// Message id of part-scoped events.
    pub fn message_id(&self) -> Option<&str> {
        match self {
            StreamEvent::StreamPartBegin { message_id, .. }
            | StreamEvent::MessageChunk { message_id, .. }
            | StreamEvent::StreamPartEnd { message_id, .. }
            | StreamEvent::ToolCall { message_id, .. } => Some(message_id),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::StreamFinalization { .. })
    }
}
