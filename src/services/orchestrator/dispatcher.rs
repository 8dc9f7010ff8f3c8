//! Tool-Call Dispatcher
//!
//! Runs the finished tool calls of one provider round, sequentially and in the
//! order the demultiplexer finalized them, and appends the results to both
//! histories. Tool failures become the tool result text; only cancellation
//! stops the loop.

use tracing::{info, warn};

use paperdesk_core::{ExecutionContext, ProviderMessage, RequestContext, StreamEvent, ToolCallPhase, UserMessage};
use paperdesk_llm::FinishedToolCall;
use paperdesk_tools::{ToolError, ToolRegistry};

use crate::models::Conversation;
use crate::services::orchestrator::TurnError;
use crate::services::streaming::StreamEmitter;

/// Dispatch every call and record request/result pairs.
pub async fn dispatch_tool_calls(
    registry: &ToolRegistry,
    ctx: &RequestContext,
    project_id: &str,
    calls: &[FinishedToolCall],
    conv: &mut Conversation,
    emitter: &mut StreamEmitter,
) -> Result<(), TurnError> {
    for call in calls {
        let message_id = call.message_id.clone();

        emitter
            .send(StreamEvent::ToolCall {
                message_id: message_id.clone(),
                phase: ToolCallPhase::Started,
                name: call.name.clone(),
                args: call.arguments.clone(),
                result: None,
                error: None,
            })
            .await?;

        let tool_ctx = ctx.tool_context(project_id, &call.call_id);
        let token = ctx.cancellation_token().clone();
        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => Err(ToolError::Cancelled),
            result = registry.invoke(&call.name, &tool_ctx, &call.arguments) => result,
        };

        let (result, error) = match outcome {
            Ok(text) => {
                info!("[Orchestrator] tool {} ({}) succeeded", call.name, call.call_id);
                (Some(text), None)
            }
            Err(ToolError::Cancelled) => {
                info!("[Orchestrator] tool {} ({}) cancelled", call.name, call.call_id);
                return Err(TurnError::Cancelled);
            }
            Err(e) => {
                warn!("[Orchestrator] tool {} ({}) failed: {}", call.name, call.call_id, e);
                (None, Some(e.to_string()))
            }
        };

        emitter
            .send(StreamEvent::ToolCall {
                message_id: message_id.clone(),
                phase: ToolCallPhase::Finished,
                name: call.name.clone(),
                args: call.arguments.clone(),
                result: result.clone(),
                error: error.clone(),
            })
            .await?;

        let model_text = match (&result, &error) {
            (Some(text), _) => text.clone(),
            (None, Some(e)) => format!("Error: {}", e),
            (None, None) => String::new(),
        };
        conv.provider_history.push(ProviderMessage::ToolRequest {
            message_id: message_id.clone(),
            call_id: call.call_id.clone(),
            name: call.name.clone(),
            arguments: call.arguments.clone(),
        });
        conv.provider_history.push(ProviderMessage::ToolResult {
            message_id: message_id.clone(),
            call_id: call.call_id.clone(),
            content: model_text,
        });
        conv.user_history.push(UserMessage::ToolCall {
            message_id,
            name: call.name.clone(),
            args: call.arguments.clone(),
            result,
            error,
        });
    }
    Ok(())
}
