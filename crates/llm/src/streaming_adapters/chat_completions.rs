//! Chat-Completions Chunk Demultiplexer
//!
//! Splits one provider round into client parts:
//!
//! - an `assistant` part for visible text; text resuming after tool calls
//!   opens another one
//! - a `reasoning` part for reasoning fragments, nested inside the first
//!   assistant part
//! - one `tool_call_prepare` part per tool call, closed as soon as its
//!   accumulated arguments parse as a JSON object
//!
//! The demuxer is a pure state machine: it never touches the network, so the
//! orchestrator decides how chunks are read and how events are delivered.

use std::collections::BTreeMap;

use tracing::{debug, warn};
use uuid::Uuid;

use paperdesk_core::{
    new_message_id, new_tool_call_key, tool_call_message_id, tool_call_prepare_message_id, MessageKind,
    PartKind, PartPayload, StreamEvent,
};

use crate::types::{ChatChunk, ToolCallFragment, UsageStats};

/// Finish reasons that leave the answer incomplete.
const INCOMPLETE_REASONS: &[&str] = &["length", "content_filter"];

/// Finish reason assumed when the stream ends without one.
const IMPLICIT_FINISH_REASON: &str = "stop";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DemuxState {
    Idle,
    PartOpen,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PartState {
    NotStarted,
    Open,
    Closed,
}

/// A tool call whose arguments validated.
#[derive(Debug, Clone, PartialEq)]
pub struct FinishedToolCall {
    /// Server-minted `toolCall_<key>` id, unique even when the provider
    /// reuses `call_id`
    pub message_id: String,
    pub call_id: String,
    pub name: String,
    /// Raw argument text exactly as the model produced it
    pub arguments: String,
}

/// Visible text of one assistant part.
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantSegment {
    pub message_id: String,
    pub content: String,
}

/// Everything collected from one provider round.
#[derive(Debug, Clone, Default)]
pub struct TurnOutput {
    /// One entry per assistant part, in stream order
    pub segments: Vec<AssistantSegment>,
    pub reasoning: String,
    pub tool_calls: Vec<FinishedToolCall>,
    pub finish_reason: Option<String>,
    pub response_id: String,
    pub usage: Option<UsageStats>,
}

impl TurnOutput {
    /// All visible text of the round.
    pub fn content(&self) -> String {
        self.segments.iter().map(|s| s.content.as_str()).collect()
    }
}

#[derive(Debug)]
struct PendingToolCall {
    call_id: String,
    name: String,
    arguments: String,
    prepare_id: String,
    message_id: String,
    finalized: bool,
}

/// Demultiplexer for one provider round.
#[derive(Debug)]
pub struct ChatCompletionsDemuxer {
    state: DemuxState,
    assistant: PartState,
    assistant_id: String,
    reasoning_part: PartState,
    reasoning_id: String,
    /// Text of the open assistant part
    content: String,
    segments: Vec<AssistantSegment>,
    reasoning: String,
    tool_calls: BTreeMap<usize, PendingToolCall>,
    finished: Vec<FinishedToolCall>,
    finish_reason: Option<String>,
    response_id: String,
    usage: Option<UsageStats>,
}

impl Default for ChatCompletionsDemuxer {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatCompletionsDemuxer {
    pub fn new() -> Self {
        Self {
            state: DemuxState::Idle,
            assistant: PartState::NotStarted,
            assistant_id: new_message_id(MessageKind::Assistant),
            reasoning_part: PartState::NotStarted,
            reasoning_id: new_message_id(MessageKind::Reasoning),
            content: String::new(),
            segments: Vec::new(),
            reasoning: String::new(),
            tool_calls: BTreeMap::new(),
            finished: Vec::new(),
            finish_reason: None,
            response_id: String::new(),
            usage: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.state == DemuxState::Finished
    }

    /// Consume one chunk and return the client events it produces.
    pub fn push(&mut self, chunk: &ChatChunk) -> Vec<StreamEvent> {
        let mut events = Vec::new();

        if !chunk.id.is_empty() {
            self.response_id = chunk.id.clone();
        }
        if let Some(usage) = chunk.usage {
            self.usage = Some(usage);
        }
        if self.state == DemuxState::Finished {
            return events;
        }
        // Usage-only trailer
        let Some(choice) = chunk.choices.first() else {
            return events;
        };
        let delta = &choice.delta;

        let content = delta.content.as_deref().filter(|c| !c.is_empty());
        let reasoning = delta.reasoning_text().filter(|r| !r.is_empty());

        if delta.role.as_deref() == Some("assistant") || content.is_some() || delta.has_reasoning_field() {
            self.begin_assistant(&mut events);
        }

        if let Some(text) = reasoning {
            self.begin_reasoning(&mut events);
            self.reasoning.push_str(text);
            events.push(StreamEvent::MessageChunk {
                message_id: self.reasoning_id.clone(),
                delta: text.to_string(),
            });
        }

        if let Some(text) = content {
            self.end_reasoning(&mut events);
            if self.assistant == PartState::Closed {
                // Text after tool calls opens a fresh assistant part.
                debug!("[Provider] assistant text resumed after tool calls");
                self.assistant_id = new_message_id(MessageKind::Assistant);
                self.assistant = PartState::NotStarted;
                self.begin_assistant(&mut events);
            }
            self.content.push_str(text);
            events.push(StreamEvent::MessageChunk {
                message_id: self.assistant_id.clone(),
                delta: text.to_string(),
            });
        }

        if let Some(fragments) = delta.tool_calls.as_ref().filter(|f| !f.is_empty()) {
            self.end_reasoning(&mut events);
            self.end_assistant(&mut events);
            for fragment in fragments {
                self.push_tool_fragment(fragment, &mut events);
            }
        }

        if let Some(reason) = choice.finish_reason.as_deref().filter(|r| !r.is_empty()) {
            self.complete(reason, &mut events);
        }

        events
    }

    /// Close the round at end of stream. A no-op once a finish reason was seen.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.state != DemuxState::Finished {
            self.complete(IMPLICIT_FINISH_REASON, &mut events);
        }
        events
    }

    pub fn into_output(mut self) -> TurnOutput {
        if self.assistant == PartState::Open {
            self.segments.push(AssistantSegment {
                message_id: self.assistant_id.clone(),
                content: std::mem::take(&mut self.content),
            });
        }
        TurnOutput {
            segments: self.segments,
            reasoning: self.reasoning,
            tool_calls: self.finished,
            finish_reason: self.finish_reason,
            response_id: self.response_id,
            usage: self.usage,
        }
    }

    fn begin_assistant(&mut self, events: &mut Vec<StreamEvent>) {
        if self.state == DemuxState::Idle {
            self.state = DemuxState::PartOpen;
        }
        if self.assistant == PartState::NotStarted {
            self.assistant = PartState::Open;
            events.push(StreamEvent::StreamPartBegin {
                message_id: self.assistant_id.clone(),
                kind: PartKind::Assistant,
            });
        }
    }

    fn end_assistant(&mut self, events: &mut Vec<StreamEvent>) {
        if self.assistant != PartState::Open {
            return;
        }
        self.assistant = PartState::Closed;
        // Reasoning belongs to the first part of the round.
        let reasoning = if self.reasoning.is_empty() || !self.segments.is_empty() {
            None
        } else {
            Some(self.reasoning.clone())
        };
        let content = std::mem::take(&mut self.content);
        events.push(StreamEvent::StreamPartEnd {
            message_id: self.assistant_id.clone(),
            kind: PartKind::Assistant,
            payload: PartPayload::Assistant {
                content: content.clone(),
                reasoning,
            },
        });
        self.segments.push(AssistantSegment {
            message_id: self.assistant_id.clone(),
            content,
        });
    }

    fn begin_reasoning(&mut self, events: &mut Vec<StreamEvent>) {
        if self.reasoning_part == PartState::NotStarted {
            self.reasoning_part = PartState::Open;
            events.push(StreamEvent::StreamPartBegin {
                message_id: self.reasoning_id.clone(),
                kind: PartKind::Reasoning,
            });
        }
    }

    fn end_reasoning(&mut self, events: &mut Vec<StreamEvent>) {
        if self.reasoning_part != PartState::Open {
            return;
        }
        self.reasoning_part = PartState::Closed;
        events.push(StreamEvent::StreamPartEnd {
            message_id: self.reasoning_id.clone(),
            kind: PartKind::Reasoning,
            payload: PartPayload::Reasoning {
                content: self.reasoning.clone(),
            },
        });
    }

    fn push_tool_fragment(&mut self, fragment: &ToolCallFragment, events: &mut Vec<StreamEvent>) {
        if self.state == DemuxState::Idle {
            self.state = DemuxState::PartOpen;
        }
        let function = fragment.function.as_ref();

        let pending = self.tool_calls.entry(fragment.index).or_insert_with(|| {
            let call_id = fragment
                .id
                .clone()
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| format!("call_{}", Uuid::new_v4().simple()));
            let key = new_tool_call_key();
            let prepare_id = tool_call_prepare_message_id(&key);
            events.push(StreamEvent::StreamPartBegin {
                message_id: prepare_id.clone(),
                kind: PartKind::ToolCallPrepare,
            });
            PendingToolCall {
                call_id,
                name: String::new(),
                arguments: String::new(),
                prepare_id,
                message_id: tool_call_message_id(&key),
                finalized: false,
            }
        });

        if pending.finalized {
            debug!(
                "[Provider] ignoring fragment for finalized tool call {}",
                pending.call_id
            );
            return;
        }

        if let Some(name) = function.and_then(|f| f.name.as_deref()) {
            if pending.name.is_empty() {
                pending.name = name.to_string();
            }
        }
        if let Some(args) = function.and_then(|f| f.arguments.as_deref()) {
            pending.arguments.push_str(args);
        }

        if !pending.name.is_empty() && is_complete_arguments(&pending.arguments) {
            pending.finalized = true;
            events.push(StreamEvent::StreamPartEnd {
                message_id: pending.prepare_id.clone(),
                kind: PartKind::ToolCallPrepare,
                payload: PartPayload::ToolCallPrepare {
                    call_id: pending.call_id.clone(),
                    name: pending.name.clone(),
                    arguments: pending.arguments.clone(),
                },
            });
            self.finished.push(FinishedToolCall {
                message_id: pending.message_id.clone(),
                call_id: pending.call_id.clone(),
                name: pending.name.clone(),
                arguments: pending.arguments.clone(),
            });
        }
    }

    fn complete(&mut self, reason: &str, events: &mut Vec<StreamEvent>) {
        self.end_reasoning(events);
        self.end_assistant(events);

        for pending in self.tool_calls.values_mut().filter(|p| !p.finalized) {
            warn!(
                "[Provider] tool call {} ({}) ended with invalid arguments; not dispatched",
                pending.call_id, pending.name
            );
            pending.finalized = true;
            events.push(StreamEvent::StreamPartEnd {
                message_id: pending.prepare_id.clone(),
                kind: PartKind::ToolCallPrepare,
                payload: PartPayload::ToolCallPrepare {
                    call_id: pending.call_id.clone(),
                    name: pending.name.clone(),
                    arguments: pending.arguments.clone(),
                },
            });
        }

        if INCOMPLETE_REASONS.contains(&reason) {
            events.push(StreamEvent::IncompleteIndicator {
                reason: reason.to_string(),
                response_id: self.response_id.clone(),
            });
        }

        self.finish_reason = Some(reason.to_string());
        self.state = DemuxState::Finished;
    }
}

/// Whether an argument buffer is a complete JSON object.
pub fn is_complete_arguments(buffer: &str) -> bool {
    if buffer.trim().is_empty() {
        return false;
    }
    matches!(
        serde_json::from_str::<serde_json::Value>(buffer),
        Ok(serde_json::Value::Object(_))
    )
}
