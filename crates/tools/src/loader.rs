//! Remote Tool Loader
//!
//! Brings up the session with the remote tool server and registers a proxy
//! for every tool it lists.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::ToolResult;
use crate::mcp_adapter::{McpToolAdapter, ProjectAccess};
use crate::mcp_client::{McpSession, McpSessionConfig};
use crate::trait_def::ToolRegistry;

/// Connect, list and register. Returns the number of tools registered.
///
/// Built-in tools registered earlier under the same name are replaced.
pub async fn load_remote_tools(
    registry: &mut ToolRegistry,
    config: McpSessionConfig,
    client: reqwest::Client,
    access: Arc<dyn ProjectAccess>,
) -> ToolResult<usize> {
    let url = config.url.clone();
    let session = Arc::new(McpSession::connect(config, client).await?);
    let tools = session.list_tools().await?;

    for tool in &tools {
        if registry.get(&tool.name).is_some() {
            warn!("[RemoteTools] {} overrides an existing tool", tool.name);
        }
        let adapter = McpToolAdapter::new(tool.clone(), Arc::clone(&session), Arc::clone(&access));
        info!(
            "[RemoteTools] registered {}{}",
            tool.name,
            if adapter.requires_injection() {
                " (context injected)"
            } else {
                ""
            }
        );
        registry.register(Arc::new(adapter));
    }

    info!("[RemoteTools] {} tools loaded from {}", tools.len(), url);
    Ok(tools.len())
}
