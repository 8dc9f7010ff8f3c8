//! Tagged Tool Results
//!
//! Remote tools may wrap their output in a versioned envelope:
//!
//! ```json
//! {
//!   "schema_version": "xtramcp.tool_result.v1",
//!   "display_mode": "verbatim",
//!   "content": "...",
//!   "success": true,
//!   "error": null,
//!   "metadata": {},
//!   "instructions": "..."
//! }
//! ```
//!
//! The envelope may be the JSON-RPC `result` itself or the text of its first
//! content item. Anything else is passed through as plain text.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{ToolError, ToolResult};
use crate::trait_def::ToolOutput;

/// Prefix every envelope `schema_version` starts with.
pub const ENVELOPE_SCHEMA_PREFIX: &str = "xtramcp.tool_result";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    /// Show the content to the user as-is
    Verbatim,
    /// Let the model interpret the content
    Interpret,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolResultEnvelope {
    pub schema_version: String,
    pub display_mode: DisplayMode,
    #[serde(default)]
    pub content: Value,
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
    #[serde(default)]
    pub instructions: Option<String>,
}

impl ToolResultEnvelope {
    fn into_output(self) -> ToolResult<ToolOutput> {
        if !self.success {
            let message = self
                .error
                .filter(|e| !e.trim().is_empty())
                .unwrap_or_else(|| "remote tool reported failure".to_string());
            return Err(ToolError::execution(message));
        }
        let content = match self.content {
            Value::String(s) => s,
            Value::Null => String::new(),
            other => other.to_string(),
        };
        let output = ToolOutput::ok(content);
        Ok(match self.instructions {
            Some(instructions) => output.with_instruction(instructions),
            None => output,
        })
    }
}

fn is_envelope(value: &Value) -> bool {
    value
        .get("schema_version")
        .and_then(Value::as_str)
        .is_some_and(|v| v.starts_with(ENVELOPE_SCHEMA_PREFIX))
}

fn parse_envelope(value: Value) -> ToolResult<ToolOutput> {
    let envelope: ToolResultEnvelope = serde_json::from_value(value)
        .map_err(|e| ToolError::invalid_response(format!("malformed tool result envelope: {}", e)))?;
    envelope.into_output()
}

/// Text items of an MCP `content` array, joined by newlines.
fn content_text(result: &Value) -> Option<String> {
    let items = result.get("content")?.as_array()?;
    let parts: Vec<&str> = items
        .iter()
        .filter_map(|item| item.get("text").and_then(Value::as_str))
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n"))
    }
}

/// Turn a `tools/call` result into tool output.
pub fn interpret_tool_result(result: Value) -> ToolResult<ToolOutput> {
    if is_envelope(&result) {
        return parse_envelope(result);
    }
    if let Some(structured) = result.get("structuredContent").filter(|v| is_envelope(v)) {
        return parse_envelope(structured.clone());
    }

    let is_error = result.get("isError").and_then(Value::as_bool).unwrap_or(false);
    let text = match &result {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => content_text(other).unwrap_or_else(|| other.to_string()),
    };

    if let Ok(inner) = serde_json::from_str::<Value>(&text) {
        if is_envelope(&inner) {
            return parse_envelope(inner);
        }
    }

    if is_error {
        return Err(ToolError::execution(text));
    }
    Ok(ToolOutput::ok(text))
}
