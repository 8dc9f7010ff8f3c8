//! Tool Setup
//!
//! Builds the process-wide tool registry: built-in project tools first, then
//! proxies for everything the remote tool server lists.

pub mod builtin;

use std::sync::Arc;

use tracing::{info, warn};

use paperdesk_llm::build_http_client;
use paperdesk_tools::{load_remote_tools, McpSessionConfig, ToolRegistry};

use crate::models::ServerConfig;
use crate::storage::ProjectStore;

pub use builtin::{CitationKeysTool, ReadProjectFileTool};

/// Registry with only the built-in tools.
pub fn builtin_registry(projects: &ProjectStore) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(CitationKeysTool::new(projects.clone())));
    registry.register(Arc::new(ReadProjectFileTool::new(projects.clone())));
    registry
}

/// Built-in tools plus remote tools. Remote failures are logged and leave the
/// built-in tools in place.
pub async fn build_registry(config: &ServerConfig, projects: &ProjectStore) -> ToolRegistry {
    let mut registry = builtin_registry(projects);

    let Some(url) = config.remote_tools.url.clone() else {
        info!("[RemoteTools] no remote tool server configured");
        return registry;
    };

    let timeout = config.remote_tools_timeout();
    let client = match build_http_client(timeout) {
        Ok(client) => client,
        Err(e) => {
            warn!("[RemoteTools] could not build HTTP client: {}", e);
            return registry;
        }
    };

    let session_config = McpSessionConfig::new(url.clone()).with_timeout(timeout);
    let access = Arc::new(projects.clone());
    if let Err(e) = load_remote_tools(&mut registry, session_config, client, access).await {
        warn!("[RemoteTools] failed to load tools from {}: {}", url, e);
    }

    info!("[RemoteTools] registry ready: {:?}", registry.names());
    registry
}
