//! Error Handling
//!
//! Unified error type for the server. Every variant maps to one of the stable
//! error kinds the client sees, either in an HTTP error body or in a
//! `StreamError` event.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use paperdesk_core::CoreError;
use paperdesk_llm::LlmError;
use paperdesk_tools::ToolError;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Request has no usable actor
    #[error("Invalid actor: {0}")]
    InvalidActor(String),

    /// Malformed or inconsistent request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Project snapshot is missing or stale
    #[error("Project out of date: {0}")]
    ProjectOutOfDate(String),

    /// Record absent or not visible to the actor
    #[error("Not found: {0}")]
    NotFound(String),

    /// Provider call failed
    #[error("Provider error: {0}")]
    Provider(#[from] LlmError),

    /// Tool dispatch failed at the transport level
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    /// Provider produced something the core cannot use
    #[error("Invalid LLM response: {0}")]
    InvalidLlmResponse(String),

    /// Database errors
    #[error("Database error: {0}")]
    Database(String),

    /// SQLite errors (auto-converted from rusqlite::Error)
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn invalid_actor(msg: impl Into<String>) -> Self {
        Self::InvalidActor(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn project_out_of_date(msg: impl Into<String>) -> Self {
        Self::ProjectOutOfDate(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invalid_llm_response(msg: impl Into<String>) -> Self {
        Self::InvalidLlmResponse(msg.into())
    }

    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Stable snake_case kind reported to clients.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidActor(_) => "invalid_actor",
            AppError::BadRequest(_) => "bad_request",
            AppError::ProjectOutOfDate(_) => "project_out_of_date",
            AppError::NotFound(_) => "record_not_found",
            AppError::Provider(_) => "provider_error",
            AppError::Tool(_) => "tool_error",
            AppError::InvalidLlmResponse(_) => "invalid_llm_response",
            AppError::Database(_)
            | AppError::Sqlite(_)
            | AppError::Config(_)
            | AppError::Io(_)
            | AppError::Serialization(_)
            | AppError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.kind() {
            "invalid_actor" => StatusCode::UNAUTHORIZED,
            "bad_request" => StatusCode::BAD_REQUEST,
            "project_out_of_date" => StatusCode::CONFLICT,
            "record_not_found" => StatusCode::NOT_FOUND,
            "provider_error" | "tool_error" | "invalid_llm_response" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show a client. Internal details stay in the logs.
    pub fn client_message(&self) -> String {
        match self.kind() {
            "internal" => "internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidActor(msg) => AppError::InvalidActor(msg),
            CoreError::Validation(msg) => AppError::BadRequest(msg),
            CoreError::Serialization(e) => AppError::Serialization(e),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<r2d2::Error> for AppError {
    fn from(err: r2d2::Error) -> Self {
        AppError::Database(format!("Failed to get connection: {}", err))
    }
}

impl From<AppError> for String {
    fn from(err: AppError) -> String {
        err.to_string()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.kind() == "internal" {
            tracing::error!("[Http] {}", self);
        }
        let body = Json(json!({
            "error": self.client_message(),
            "kind": self.kind(),
        }));
        (self.status(), body).into_response()
    }
}
