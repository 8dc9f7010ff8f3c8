//! Built-in Project Tools
//!
//! Tools answered from the project snapshot store. Both run for the actor of
//! the turn and only on projects that actor owns.

use async_trait::async_trait;
use serde_json::{json, Value};

use paperdesk_core::{ExecutionContext, ToolContext};
use paperdesk_tools::{parse_arguments, Tool, ToolError, ToolOutput, ToolResult};

use crate::models::ProjectSnapshot;
use crate::storage::ProjectStore;

/// Load the tool context's project, checking ownership.
fn load_owned_project(projects: &ProjectStore, ctx: &ToolContext) -> ToolResult<ProjectSnapshot> {
    let actor = ctx
        .require_actor()
        .map_err(|e| ToolError::permission_denied(e.to_string()))?;
    if ctx.project_id().is_empty() {
        return Err(ToolError::invalid_arguments("no project in context"));
    }
    projects
        .get(&actor.user_id, ctx.project_id())
        .map_err(|e| match e.kind() {
            "record_not_found" => ToolError::permission_denied(format!(
                "project {} is not accessible",
                ctx.project_id()
            )),
            _ => ToolError::execution(e.to_string()),
        })
}

/// `get_citation_keys`
pub struct CitationKeysTool {
    projects: ProjectStore,
}

impl CitationKeysTool {
    pub const NAME: &'static str = "get_citation_keys";

    pub fn new(projects: ProjectStore) -> Self {
        Self { projects }
    }
}

#[async_trait]
impl Tool for CitationKeysTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "List the BibTeX citation keys defined in the current project's .bib files."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn execute(&self, ctx: &ToolContext, raw_args: &str) -> ToolResult<ToolOutput> {
        parse_arguments(raw_args)?;
        let project = load_owned_project(&self.projects, ctx)?;
        let keys = project.citation_keys();
        if keys.is_empty() {
            return Ok(ToolOutput::ok("The project defines no citation keys."));
        }
        Ok(ToolOutput::ok(keys.join("\n")))
    }
}

/// `read_project_file`
pub struct ReadProjectFileTool {
    projects: ProjectStore,
}

impl ReadProjectFileTool {
    pub const NAME: &'static str = "read_project_file";

    pub fn new(projects: ProjectStore) -> Self {
        Self { projects }
    }
}

#[async_trait]
impl Tool for ReadProjectFileTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Read a file of the current project by path. Optionally restrict to a 1-based inclusive line range."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "filepath": {
                    "type": "string",
                    "description": "Path of the document inside the project, e.g. chapters/intro.tex"
                },
                "start_line": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "First line to return (1-based)"
                },
                "end_line": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "Last line to return (inclusive)"
                }
            },
            "required": ["filepath"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, raw_args: &str) -> ToolResult<ToolOutput> {
        let args = parse_arguments(raw_args)?;
        let filepath = args
            .get("filepath")
            .and_then(Value::as_str)
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| ToolError::invalid_arguments("filepath is required"))?;
        let start_line = line_arg(&args, "start_line")?;
        let end_line = line_arg(&args, "end_line")?;

        let project = load_owned_project(&self.projects, ctx)?;
        let doc = project
            .find_document(filepath)
            .ok_or_else(|| ToolError::execution(format!("no such file: {}", filepath)))?;

        let total = doc.lines.len();
        let start = start_line.unwrap_or(1);
        let end = end_line.unwrap_or(total).min(total);
        if total == 0 {
            return Ok(ToolOutput::ok(""));
        }
        if start > end {
            return Err(ToolError::invalid_arguments(format!(
                "line range {}-{} is empty (file has {} lines)",
                start, end, total
            )));
        }

        let text = doc.lines[start - 1..end]
            .iter()
            .enumerate()
            .map(|(offset, line)| format!("{:>5}\t{}", start + offset, line))
            .collect::<Vec<_>>()
            .join("\n");
        Ok(ToolOutput::ok(text))
    }
}

fn line_arg(args: &serde_json::Map<String, Value>, key: &str) -> ToolResult<Option<usize>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => match value.as_u64() {
            Some(n) if n >= 1 => Ok(Some(n as usize)),
            _ => Err(ToolError::invalid_arguments(format!(
                "{} must be a positive integer",
                key
            ))),
        },
    }
}
