//! Core Error Types
//!
//! Foundational error types shared by every PaperDesk crate. Kept to
//! thiserror + std so that the core crate stays lightweight; the server
//! crate layers storage and HTTP variants on top.

use thiserror::Error;

/// Core error type for the PaperDesk workspace.
#[derive(Error, Debug)]
pub enum CoreError {
    /// The request carries no authenticated actor
    #[error("Invalid actor: {0}")]
    InvalidActor(String),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// A conversation history violates one of its structural rules
    #[error("History error: {0}")]
    History(String),

    /// The operation was cancelled through its context
    #[error("Operation cancelled")]
    Cancelled,

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for core errors
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub fn invalid_actor(msg: impl Into<String>) -> Self {
        Self::InvalidActor(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn history(msg: impl Into<String>) -> Self {
        Self::History(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<CoreError> for String {
    fn from(err: CoreError) -> String {
        err.to_string()
    }
}
