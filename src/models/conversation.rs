//! Conversation Models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use paperdesk_core::{check_histories, CoreResult, ProviderMessage, UserMessage};

/// Placeholder title until the background summarizer names the conversation.
pub const SENTINEL_TITLE: &str = "New Conversation .";

/// A persisted conversation with both histories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub owner_id: String,
    pub project_id: String,
    pub title: String,
    pub model_slug: String,
    pub user_history: Vec<UserMessage>,
    pub provider_history: Vec<ProviderMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Conversation {
    pub fn new(
        owner_id: impl Into<String>,
        project_id: impl Into<String>,
        model_slug: impl Into<String>,
        user_history: Vec<UserMessage>,
        provider_history: Vec<ProviderMessage>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            project_id: project_id.into(),
            title: SENTINEL_TITLE.to_string(),
            model_slug: model_slug.into(),
            user_history,
            provider_history,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn has_sentinel_title(&self) -> bool {
        self.title == SENTINEL_TITLE
    }

    /// Structural check of the two histories.
    pub fn check_consistency(&self) -> CoreResult<()> {
        check_histories(&self.provider_history, &self.user_history)
    }
}

/// Listing entry; histories are never loaded for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: String,
    pub project_id: String,
    pub title: String,
    pub model_slug: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Conversation> for ConversationSummary {
    fn from(conv: Conversation) -> Self {
        Self {
            id: conv.id,
            project_id: conv.project_id,
            title: conv.title,
            model_slug: conv.model_slug,
            created_at: conv.created_at,
            updated_at: conv.updated_at,
        }
    }
}

/// What `GetConversation` returns: the client-facing history only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationView {
    pub id: String,
    pub project_id: String,
    pub title: String,
    pub model_slug: String,
    pub messages: Vec<UserMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Conversation> for ConversationView {
    fn from(conv: Conversation) -> Self {
        Self {
            id: conv.id,
            project_id: conv.project_id,
            title: conv.title,
            model_slug: conv.model_slug,
            messages: conv.user_history,
            created_at: conv.created_at,
            updated_at: conv.updated_at,
        }
    }
}
