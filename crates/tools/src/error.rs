//! Tool Errors

use thiserror::Error;

/// Errors raised while resolving or running a tool.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    /// No tool is registered under the requested name
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// The model's arguments were not a JSON object or missed required fields
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// The actor may not act on the requested resource
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The remote tool server answered with a JSON-RPC error
    #[error("Remote tool error [{code}]: {message}")]
    Remote { code: i64, message: String },

    /// The remote tool server could not be reached or answered non-2xx
    #[error("Transport error: {0}")]
    Transport(String),

    /// The remote tool server answered with something we cannot interpret
    #[error("Invalid tool response: {0}")]
    InvalidResponse(String),

    /// The tool ran and reported failure
    #[error("Tool failed: {0}")]
    Execution(String),

    #[error("Tool call cancelled")]
    Cancelled,
}

pub type ToolResult<T> = Result<T, ToolError>;

impl ToolError {
    pub fn invalid_arguments(msg: impl Into<String>) -> Self {
        Self::InvalidArguments(msg.into())
    }

    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::PermissionDenied(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }
}
