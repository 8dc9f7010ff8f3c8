//! Data Models
//!
//! Conversations, project snapshots, requests, responses and settings.

pub mod conversation;
pub mod project;
pub mod request;
pub mod response;
pub mod settings;

pub use conversation::{Conversation, ConversationSummary, ConversationView, SENTINEL_TITLE};
pub use project::{extract_citation_keys, Document, Folder, ProjectSnapshot, ProjectUpsert};
pub use request::{
    ConversationKind, ListConversationsQuery, StreamTurnRequest, UpdateConversationRequest, ROOT_PARENT_ID,
};
pub use response::{CitationKeysResponse, HealthResponse, ProjectSummary};
pub use settings::{ServerConfig, UserSettings};
