//! Dual-View Message Model
//!
//! A conversation keeps two histories:
//!
//! - `UserMessage` records, the history the client renders
//! - `ProviderMessage` records, the history replayed to the model
//!
//! Both are linked by `message_id`: every provider record carries the id of the
//! user-facing record it mirrors. Tool calls appear once on the user side and as
//! a request/result pair on the provider side, all three sharing
//! `toolCall_<key>`. The key is minted per call by the server; provider call
//! ids are reused freely across turns and only travel in `call_id` fields.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

// ============================================================================
// Message ids
// ============================================================================

/// Kind prefix encoded in every message id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    System,
    User,
    Assistant,
    Reasoning,
    ToolCallPrepare,
    ToolCall,
}

impl MessageKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            MessageKind::System => "system",
            MessageKind::User => "user",
            MessageKind::Assistant => "assistant",
            MessageKind::Reasoning => "reasoning",
            MessageKind::ToolCallPrepare => "toolCallPrepare",
            MessageKind::ToolCall => "toolCall",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "system" => Some(MessageKind::System),
            "user" => Some(MessageKind::User),
            "assistant" => Some(MessageKind::Assistant),
            "reasoning" => Some(MessageKind::Reasoning),
            "toolCallPrepare" => Some(MessageKind::ToolCallPrepare),
            "toolCall" => Some(MessageKind::ToolCall),
            _ => None,
        }
    }
}

/// Generate a fresh `<kind>_<uuid>` message id.
pub fn new_message_id(kind: MessageKind) -> String {
    format!("{}_{}", kind.prefix(), Uuid::new_v4().simple())
}

/// Fresh key naming one tool call in both of its message ids.
pub fn new_tool_call_key() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Message id shared by the user record and provider records of one tool call.
pub fn tool_call_message_id(key: &str) -> String {
    format!("{}_{}", MessageKind::ToolCall.prefix(), key)
}

/// Message id of the streamed prepare part of one tool call.
pub fn tool_call_prepare_message_id(key: &str) -> String {
    format!("{}_{}", MessageKind::ToolCallPrepare.prefix(), key)
}

/// Recover the kind encoded in a message id.
pub fn message_kind_of(message_id: &str) -> Option<MessageKind> {
    let (prefix, rest) = message_id.split_once('_')?;
    if rest.is_empty() {
        return None;
    }
    MessageKind::from_prefix(prefix)
}

// ============================================================================
// UserMessage
// ============================================================================

/// A record of the client-facing history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UserMessage {
    System {
        message_id: String,
        content: String,
    },
    User {
        message_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selected_text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        surrounding: Option<String>,
    },
    Assistant {
        message_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reasoning: Option<String>,
        model_slug: String,
    },
    ToolCallPrepare {
        message_id: String,
        name: String,
        args: String,
    },
    ToolCall {
        message_id: String,
        name: String,
        args: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// Records this build cannot interpret, kept verbatim so a save does
    /// not drop them.
    #[serde(untagged)]
    Unknown(serde_json::Value),
}

impl UserMessage {
    pub fn user(content: impl Into<String>, selected_text: Option<String>, surrounding: Option<String>) -> Self {
        UserMessage::User {
            message_id: new_message_id(MessageKind::User),
            content: content.into(),
            selected_text: selected_text.filter(|s| !s.is_empty()),
            surrounding: surrounding.filter(|s| !s.is_empty()),
        }
    }

    /// The record's id; empty for an `Unknown` record without one.
    pub fn message_id(&self) -> &str {
        match self {
            UserMessage::System { message_id, .. }
            | UserMessage::User { message_id, .. }
            | UserMessage::Assistant { message_id, .. }
            | UserMessage::ToolCallPrepare { message_id, .. }
            | UserMessage::ToolCall { message_id, .. } => message_id,
            UserMessage::Unknown(raw) => raw
                .get("message_id")
                .and_then(serde_json::Value::as_str)
                .unwrap_or(""),
        }
    }

    pub fn is_tool_record(&self) -> bool {
        matches!(
            self,
            UserMessage::ToolCall { .. } | UserMessage::ToolCallPrepare { .. }
        )
    }
}

// ============================================================================
// ProviderMessage
// ============================================================================

/// A record of the model-facing history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ProviderMessage {
    System {
        message_id: String,
        content: String,
    },
    User {
        message_id: String,
        content: String,
    },
    Assistant {
        message_id: String,
        content: String,
    },
    ToolRequest {
        message_id: String,
        call_id: String,
        name: String,
        arguments: String,
    },
    ToolResult {
        message_id: String,
        call_id: String,
        content: String,
    },
}

impl ProviderMessage {
    pub fn system(content: impl Into<String>) -> Self {
        ProviderMessage::System {
            message_id: new_message_id(MessageKind::System),
            content: content.into(),
        }
    }

    pub fn message_id(&self) -> &str {
        match self {
            ProviderMessage::System { message_id, .. }
            | ProviderMessage::User { message_id, .. }
            | ProviderMessage::Assistant { message_id, .. }
            | ProviderMessage::ToolRequest { message_id, .. }
            | ProviderMessage::ToolResult { message_id, .. } => message_id,
        }
    }

    pub fn is_system(&self) -> bool {
        matches!(self, ProviderMessage::System { .. })
    }
}

// ============================================================================
// History checks
// ============================================================================

/// Check the structural rules both histories must satisfy after every
/// persisted update: a single leading system message, one provider record per
/// non-tool user record, and unique user-side ids.
pub fn check_histories(provider: &[ProviderMessage], user: &[UserMessage]) -> CoreResult<()> {
    match provider.first() {
        Some(first) if first.is_system() => {}
        _ => return Err(CoreError::history("provider history must start with a system message")),
    }
    if provider.iter().skip(1).any(ProviderMessage::is_system) {
        return Err(CoreError::history("provider history has more than one system message"));
    }

    let mut seen = HashSet::new();
    for message in user {
        let id = message.message_id();
        if !id.is_empty() && !seen.insert(id) {
            return Err(CoreError::history(format!("duplicate message id '{}'", id)));
        }
    }

    let mirrored = provider
        .iter()
        .skip(1)
        .filter(|m| !matches!(m, ProviderMessage::ToolRequest { .. } | ProviderMessage::ToolResult { .. }))
        .count();
    let conversational = user
        .iter()
        .filter(|m| matches!(m, UserMessage::User { .. } | UserMessage::Assistant { .. }))
        .count();
    if mirrored != conversational {
        return Err(CoreError::history(format!(
            "{} provider records mirror {} user records",
            mirrored, conversational
        )));
    }

    Ok(())
}
