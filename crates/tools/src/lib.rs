//! PaperDesk Tools
//!
//! Tool registry and remote tool plumbing:
//! - `Tool` trait and `ToolRegistry` - dispatch by name with raw arguments
//! - `McpSession` - JSON-RPC session with the remote tool server
//! - `McpToolAdapter` - proxy that injects user/project context
//! - `interpret_tool_result` - unwraps tagged tool result envelopes
//!
//! Built-in tools that need storage live in the server crate.

pub mod error;
pub mod loader;
pub mod mcp_adapter;
pub mod mcp_client;
pub mod mcp_schema;
pub mod result_envelope;
pub mod trait_def;

pub use error::{ToolError, ToolResult};
pub use loader::load_remote_tools;
pub use mcp_adapter::{McpToolAdapter, ProjectAccess};
pub use mcp_client::{McpServerInfo, McpSession, McpSessionConfig, McpToolInfo, SESSION_HEADER};
pub use mcp_schema::{strip_injected_fields, InjectionPlan};
pub use result_envelope::{interpret_tool_result, DisplayMode, ToolResultEnvelope};
pub use trait_def::{parse_arguments, Tool, ToolOutput, ToolRegistry};
