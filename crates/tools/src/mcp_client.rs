//! Remote Tool Session
//!
//! JSON-RPC 2.0 client for the remote tool server over streamable HTTP.
//!
//! The session is established once at startup:
//! 1. `initialize`, whose response carries the `mcp-session-id` header
//! 2. `notifications/initialized` (no id) acknowledging the session
//! 3. `tools/list`
//!
//! Every later request carries the session header. Responses may be plain JSON
//! or SSE-framed; for the latter only the first `data:` line is kept.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{ToolError, ToolResult};

/// Header carrying the session id on every request after `initialize`.
pub const SESSION_HEADER: &str = "mcp-session-id";

/// Protocol revision sent in `initialize`.
pub const PROTOCOL_VERSION: &str = "2025-03-26";

/// Settings for one remote tool server.
#[derive(Debug, Clone, PartialEq)]
pub struct McpSessionConfig {
    pub url: String,
    pub client_name: String,
    pub client_version: String,
    pub request_timeout: Duration,
}

impl McpSessionConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client_name: "paperdesk".to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
            request_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Information about the connected server
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct McpServerInfo {
    pub protocol_version: String,
    pub capabilities: Value,
    pub server_info: Value,
}

/// Information about a tool provided by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpToolInfo {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
}

/// JSON-RPC 2.0 request. Notifications carry no id.
#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

/// JSON-RPC 2.0 response
#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error
#[derive(Debug, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    /// The `result`, or the `error` as a typed error.
    pub fn into_result(self) -> ToolResult<Value> {
        if let Some(error) = self.error {
            return Err(ToolError::Remote {
                code: error.code,
                message: error.message,
            });
        }
        self.result
            .ok_or_else(|| ToolError::invalid_response("response has neither result nor error"))
    }
}

/// Payload of the first `data:` line of an SSE-framed body.
pub fn first_sse_data(body: &str) -> Option<&str> {
    body.lines().find_map(|line| {
        let line = line.trim_end_matches('\r');
        let payload = line.strip_prefix("data:")?;
        Some(payload.strip_prefix(' ').unwrap_or(payload))
    })
}

/// Parse a response body that is either plain JSON or SSE-framed JSON.
pub fn parse_jsonrpc_body(body: &str) -> ToolResult<JsonRpcResponse> {
    let trimmed = body.trim_start();
    let payload = if trimmed.starts_with('{') {
        trimmed
    } else {
        first_sse_data(body)
            .ok_or_else(|| ToolError::invalid_response("SSE body has no data line"))?
    };
    serde_json::from_str(payload)
        .map_err(|e| ToolError::invalid_response(format!("invalid JSON-RPC response: {}", e)))
}

/// An initialized session with the remote tool server.
pub struct McpSession {
    client: reqwest::Client,
    config: McpSessionConfig,
    session_id: String,
    server_info: McpServerInfo,
    request_id: AtomicU64,
}

impl McpSession {
    /// Run the `initialize` handshake.
    pub async fn connect(config: McpSessionConfig, client: reqwest::Client) -> ToolResult<Self> {
        let request_id = AtomicU64::new(1);
        let init = JsonRpcRequest {
            jsonrpc: "2.0",
            id: Some(request_id.fetch_add(1, Ordering::SeqCst)),
            method: "initialize",
            params: Some(json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": {
                    "name": config.client_name,
                    "version": config.client_version
                }
            })),
        };

        let response = post(&client, &config, None, &init).await?;
        let session_id = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                ToolError::invalid_response(format!("initialize response has no {} header", SESSION_HEADER))
            })?;
        let body = read_body(response).await?;
        let result = parse_jsonrpc_body(&body)?.into_result()?;

        let server_info = McpServerInfo {
            protocol_version: result
                .get("protocolVersion")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
            capabilities: result.get("capabilities").cloned().unwrap_or_else(|| json!({})),
            server_info: result.get("serverInfo").cloned().unwrap_or_else(|| json!({})),
        };

        let session = Self {
            client,
            config,
            session_id,
            server_info,
            request_id,
        };
        session.notify("notifications/initialized").await?;
        debug!(
            "[RemoteTools] session {} established (protocol {})",
            session.session_id, session.server_info.protocol_version
        );
        Ok(session)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn server_info(&self) -> &McpServerInfo {
        &self.server_info
    }

    /// List all tools the server exposes.
    pub async fn list_tools(&self) -> ToolResult<Vec<McpToolInfo>> {
        let result = self.request("tools/list", Some(json!({}))).await?;
        let tools = result
            .get("tools")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(tools
            .into_iter()
            .filter_map(|tool| {
                let name = tool.get("name").and_then(Value::as_str)?.to_string();
                Some(McpToolInfo {
                    name,
                    description: tool
                        .get("description")
                        .and_then(Value::as_str)
                        .unwrap_or("")
                        .to_string(),
                    input_schema: tool
                        .get("inputSchema")
                        .cloned()
                        .unwrap_or_else(|| json!({"type": "object"})),
                    output_schema: tool.get("outputSchema").cloned(),
                })
            })
            .collect())
    }

    /// Call a tool and return the raw JSON-RPC `result`.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> ToolResult<Value> {
        self.request(
            "tools/call",
            Some(json!({ "name": name, "arguments": arguments })),
        )
        .await
    }

    async fn request(&self, method: &str, params: Option<Value>) -> ToolResult<Value> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: Some(self.request_id.fetch_add(1, Ordering::SeqCst)),
            method,
            params,
        };
        let response = post(&self.client, &self.config, Some(&self.session_id), &request).await?;
        let body = read_body(response).await?;
        parse_jsonrpc_body(&body)?.into_result()
    }

    async fn notify(&self, method: &str) -> ToolResult<()> {
        let notification = JsonRpcRequest {
            jsonrpc: "2.0",
            id: None,
            method,
            params: None,
        };
        post(&self.client, &self.config, Some(&self.session_id), &notification).await?;
        Ok(())
    }
}

impl std::fmt::Debug for McpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpSession")
            .field("url", &self.config.url)
            .field("session_id", &self.session_id)
            .finish()
    }
}

async fn post(
    client: &reqwest::Client,
    config: &McpSessionConfig,
    session_id: Option<&str>,
    request: &JsonRpcRequest<'_>,
) -> ToolResult<reqwest::Response> {
    let mut builder = client
        .post(&config.url)
        .header("Content-Type", "application/json")
        .header("Accept", "application/json, text/event-stream")
        .json(request);
    if let Some(id) = session_id {
        builder = builder.header(SESSION_HEADER, id);
    }
    if !config.request_timeout.is_zero() {
        builder = builder.timeout(config.request_timeout);
    }

    let response = builder
        .send()
        .await
        .map_err(|e| ToolError::transport(format!("{} request failed: {}", request.method, e)))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(ToolError::transport(format!(
            "{} returned HTTP {}: {}",
            request.method, status, body
        )));
    }
    Ok(response)
}

async fn read_body(response: reqwest::Response) -> ToolResult<String> {
    response
        .text()
        .await
        .map_err(|e| ToolError::transport(format!("failed to read response body: {}", e)))
}
