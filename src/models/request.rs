//! Request Models
//!
//! Bodies accepted by the conversation endpoints.

use serde::{Deserialize, Serialize};

/// Parent id that rewinds a conversation to its system prompt.
pub const ROOT_PARENT_ID: &str = "root";

/// Template family used for a turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationKind {
    #[default]
    Default,
    /// Skips the project snapshot; the prompt carries a placeholder instead.
    Debug,
}

/// `CreateConversationMessageStream` request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamTurnRequest {
    pub project_id: String,
    /// Empty starts a new conversation
    #[serde(default)]
    pub conversation_id: String,
    pub user_message: String,
    #[serde(default, alias = "user_selected_text")]
    pub selected_text: String,
    #[serde(default)]
    pub surrounding: String,
    pub model_slug: String,
    #[serde(default, alias = "conversation_type")]
    pub kind: ConversationKind,
    /// Empty appends; "root" or a user-history message id branches first
    #[serde(default)]
    pub parent_message_id: String,
}

impl StreamTurnRequest {
    pub fn is_new_conversation(&self) -> bool {
        self.conversation_id.trim().is_empty()
    }

    /// Reject requests that cannot start a turn.
    pub fn validate(&self) -> Result<(), String> {
        if self.project_id.trim().is_empty() {
            return Err("project_id is required".to_string());
        }
        if self.model_slug.trim().is_empty() {
            return Err("model_slug is required".to_string());
        }
        if self.user_message.trim().is_empty() {
            return Err("user_message must not be empty".to_string());
        }
        Ok(())
    }
}

/// `UpdateConversation` body
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateConversationRequest {
    pub title: String,
}

/// Query of `ListConversations`
#[derive(Debug, Clone, Deserialize)]
pub struct ListConversationsQuery {
    pub project_id: String,
}
