//! Tool Trait and Registry
//!
//! A process-wide mapping from tool name to handler. Handlers receive the raw
//! argument text exactly as the model produced it; parsing is each tool's
//! business.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use paperdesk_core::ToolContext;
use paperdesk_llm::ToolDefinition;

use crate::error::{ToolError, ToolResult};

/// What a tool hands back on success.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolOutput {
    pub result: String,
    /// Next step the model should treat as authoritative
    pub instruction: Option<String>,
}

impl ToolOutput {
    pub fn ok(result: impl Into<String>) -> Self {
        Self {
            result: result.into(),
            instruction: None,
        }
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        let instruction = instruction.into();
        self.instruction = if instruction.trim().is_empty() {
            None
        } else {
            Some(instruction)
        };
        self
    }

    /// Text fed back to the model.
    pub fn into_model_text(self) -> String {
        match self.instruction {
            Some(instruction) if !instruction.is_empty() => format!(
                "<RESULT>{}</RESULT><INSTRUCTION>{}</INSTRUCTION>",
                self.result, instruction
            ),
            _ => self.result,
        }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema advertised to the model.
    fn parameters_schema(&self) -> Value;

    async fn execute(&self, ctx: &ToolContext, raw_args: &str) -> ToolResult<ToolOutput>;
}

/// Parse raw arguments into a JSON object. Empty input counts as `{}`.
pub fn parse_arguments(raw_args: &str) -> ToolResult<Map<String, Value>> {
    if raw_args.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(raw_args) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(ToolError::invalid_arguments(format!(
            "expected a JSON object, got {}",
            json_type_name(&other)
        ))),
        Err(e) => Err(ToolError::invalid_arguments(e.to_string())),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Registry of tools keyed by name, preserving registration order.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A later registration under the same name replaces the
    /// earlier one and keeps its position.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if !self.tools.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.tools.insert(name, tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Definitions advertised to the model, in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters_schema(),
            })
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Invoke a tool by name and return the text fed back to the model.
    pub async fn invoke(&self, name: &str, ctx: &ToolContext, raw_args: &str) -> ToolResult<String> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        let output = tool.execute(ctx, raw_args).await?;
        Ok(output.into_model_text())
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.order)
            .finish()
    }
}
