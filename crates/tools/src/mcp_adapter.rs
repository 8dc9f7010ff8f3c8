//! Remote Tool Proxy
//!
//! Wraps a tool discovered on the remote tool server as a `Tool`, so that it
//! is advertised and dispatched exactly like a built-in one.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use paperdesk_core::{ExecutionContext, ToolContext};

use crate::error::{ToolError, ToolResult};
use crate::mcp_client::{McpSession, McpToolInfo};
use crate::mcp_schema::{normalize_object_schema, strip_injected_fields, InjectionPlan};
use crate::result_envelope::interpret_tool_result;
use crate::trait_def::{parse_arguments, Tool, ToolOutput};

/// Confirms that an actor owns a project before any remote call.
#[async_trait]
pub trait ProjectAccess: Send + Sync {
    async fn verify_owner(&self, user_id: &str, project_id: &str) -> ToolResult<()>;
}

/// Proxy for one remote tool.
pub struct McpToolAdapter {
    name: String,
    description: String,
    /// Schema shown to the model, without injected fields
    advertised_schema: Value,
    plan: InjectionPlan,
    session: Arc<McpSession>,
    access: Arc<dyn ProjectAccess>,
}

impl McpToolAdapter {
    pub fn new(info: McpToolInfo, session: Arc<McpSession>, access: Arc<dyn ProjectAccess>) -> Self {
        let plan = InjectionPlan::from_schema(&info.input_schema);
        let mut advertised_schema = if plan.requires_injection() {
            strip_injected_fields(&info.input_schema)
        } else {
            info.input_schema.clone()
        };
        normalize_object_schema(&mut advertised_schema);

        Self {
            name: info.name,
            description: info.description,
            advertised_schema,
            plan,
            session,
            access,
        }
    }

    pub fn requires_injection(&self) -> bool {
        self.plan.requires_injection()
    }
}

#[async_trait]
impl Tool for McpToolAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        self.advertised_schema.clone()
    }

    async fn execute(&self, ctx: &ToolContext, raw_args: &str) -> ToolResult<ToolOutput> {
        let mut arguments = parse_arguments(raw_args)?;

        // Every remote call is made on behalf of the owner of the project.
        let actor = ctx
            .require_actor()
            .map_err(|e| ToolError::permission_denied(e.to_string()))?;
        let project_id = ctx.project_id();
        if project_id.is_empty() {
            return Err(ToolError::permission_denied(format!(
                "tool '{}' needs a project but the conversation has none",
                self.name
            )));
        }
        self.access.verify_owner(&actor.user_id, project_id).await?;

        if self.plan.requires_injection() {
            self.plan.inject(&mut arguments, &actor.user_id, project_id);
        }

        debug!(
            "[RemoteTools] calling {} (call {})",
            self.name,
            ctx.call_id()
        );
        let call = self.session.call_tool(&self.name, Value::Object(arguments));
        let result = tokio::select! {
            _ = ctx.cancellation_token().cancelled() => return Err(ToolError::Cancelled),
            result = call => result?,
        };
        interpret_tool_result(result)
    }
}
