//! Conversation Orchestrator
//!
//! The streaming tool-calling loop behind `CreateConversationMessageStream`.

pub mod branch;
pub mod dispatcher;
mod service;
pub mod title;

use paperdesk_llm::LlmError;

use crate::services::streaming::EmitError;
use crate::utils::error::AppError;

pub use service::{OrchestratorConfig, OrchestratorService, Stores, TurnOutcome, MAX_TOOL_ROUNDS};

/// Why a turn stopped early
#[derive(Debug)]
pub enum TurnError {
    /// Client gone or request cancelled; nothing more is emitted or persisted
    Cancelled,
    /// Reported to the client as `StreamError`
    Failed(AppError),
}

impl From<AppError> for TurnError {
    fn from(err: AppError) -> Self {
        TurnError::Failed(err)
    }
}

impl From<LlmError> for TurnError {
    fn from(err: LlmError) -> Self {
        TurnError::Failed(err.into())
    }
}

impl From<EmitError> for TurnError {
    fn from(_: EmitError) -> Self {
        TurnError::Cancelled
    }
}
