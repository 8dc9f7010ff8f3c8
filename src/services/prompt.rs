//! Prompt Assembler
//!
//! Renders the system and user prompts of a turn from `{{variable}}`
//! templates. Templates are parsed once when the assembler is built; variables
//! without a value render as empty and the output is trimmed.

use std::collections::HashMap;

use regex::Regex;

use crate::models::ConversationKind;
use crate::utils::error::{AppError, AppResult};

/// Stands in for the project content in debug conversations.
pub const DEBUG_CONTENT_PLACEHOLDER: &str = "[project content omitted in debug mode]";

const DEFAULT_SYSTEM_TEMPLATE: &str = r#"You are PaperDesk, an assistant embedded in a LaTeX editor. You help the author write, revise and check their paper.

Guidelines:
- Answer in the language of the user's message unless asked otherwise.
- When you propose LaTeX, return it ready to paste, without explanations inside the code.
- Preserve the author's macros, labels and citation keys.
- Use the available tools when you need project files or citation keys instead of guessing.

## Project instructions
{{project_instructions}}

## User instructions
{{user_instructions}}

## Project content
{{full_content}}"#;

const DEBUG_SYSTEM_TEMPLATE: &str = r#"You are PaperDesk running in debug mode. Be concise and describe which tools you would call and why.

## Project instructions
{{project_instructions}}

## User instructions
{{user_instructions}}

## Project content
{{full_content}}"#;

const DEFAULT_USER_TEMPLATE: &str = r#"{{user_input}}

<selected_text>
{{selected_text}}
</selected_text>

<surrounding>
{{surrounding}}
</surrounding>"#;

const DEBUG_USER_TEMPLATE: &str = r#"[debug] {{user_input}}

<selected_text>
{{selected_text}}
</selected_text>"#;

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Variable(String),
}

/// A pre-parsed `{{variable}}` template.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    segments: Vec<Segment>,
}

impl PromptTemplate {
    pub fn parse(source: &str) -> AppResult<Self> {
        let re = Regex::new(r"\{\{(\w+)\}\}").map_err(|e| AppError::internal(e.to_string()))?;
        let mut segments = Vec::new();
        let mut last = 0;
        for caps in re.captures_iter(source) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if whole.start() > last {
                segments.push(Segment::Literal(source[last..whole.start()].to_string()));
            }
            segments.push(Segment::Variable(name.as_str().to_string()));
            last = whole.end();
        }
        if last < source.len() {
            segments.push(Segment::Literal(source[last..].to_string()));
        }
        Ok(Self { segments })
    }

    /// Names of the variables, in order of appearance.
    pub fn variables(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Variable(name) => Some(name.as_str()),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    pub fn render(&self, vars: &HashMap<&str, &str>) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Variable(name) => out.push_str(vars.get(name.as_str()).copied().unwrap_or("")),
            }
        }
        out.trim().to_string()
    }
}

/// Builds the prompts of a turn.
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    default_system: PromptTemplate,
    debug_system: PromptTemplate,
    default_user: PromptTemplate,
    debug_user: PromptTemplate,
}

impl PromptAssembler {
    pub fn new() -> AppResult<Self> {
        Ok(Self {
            default_system: PromptTemplate::parse(DEFAULT_SYSTEM_TEMPLATE)?,
            debug_system: PromptTemplate::parse(DEBUG_SYSTEM_TEMPLATE)?,
            default_user: PromptTemplate::parse(DEFAULT_USER_TEMPLATE)?,
            debug_user: PromptTemplate::parse(DEBUG_USER_TEMPLATE)?,
        })
    }

    pub fn build_system_prompt(
        &self,
        full_content: &str,
        project_instructions: &str,
        user_instructions: &str,
        kind: ConversationKind,
    ) -> String {
        let (template, content) = match kind {
            ConversationKind::Default => (&self.default_system, full_content),
            ConversationKind::Debug => (&self.debug_system, DEBUG_CONTENT_PLACEHOLDER),
        };
        let vars = HashMap::from([
            ("full_content", content),
            ("project_instructions", project_instructions),
            ("user_instructions", user_instructions),
        ]);
        template.render(&vars)
    }

    pub fn build_user_prompt(
        &self,
        user_input: &str,
        selected_text: &str,
        surrounding: &str,
        kind: ConversationKind,
    ) -> String {
        let template = match kind {
            ConversationKind::Default => &self.default_user,
            ConversationKind::Debug => &self.debug_user,
        };
        let vars = HashMap::from([
            ("user_input", user_input),
            ("selected_text", selected_text),
            ("surrounding", surrounding),
        ]);
        template.render(&vars)
    }
}
