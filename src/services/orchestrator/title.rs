//! Background Title Summarizer
//!
//! Names a conversation after its first exchange. Runs detached from the
//! request with a bounded lifetime; any failure leaves the sentinel title, and
//! a title set by the user meanwhile is never overwritten.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use paperdesk_core::{new_message_id, ExecutionContext, MessageKind, ProviderMessage, RequestContext, UserMessage};
use paperdesk_llm::{ChatRequest, LlmProvider};

use crate::storage::ConversationStore;
use crate::utils::error::AppResult;

pub const TITLE_SYSTEM_PROMPT: &str = "Summarize the following conversation between a user and a writing assistant \
as a title of at most 6 words. Reply with the title only, without quotes or punctuation at the end.";

/// Per-message cap in the rendered dialog.
const MAX_MESSAGE_CHARS: usize = 500;

/// `User:` / `Assistant:` lines; tool records are skipped.
pub fn render_dialog(history: &[UserMessage]) -> String {
    history
        .iter()
        .filter_map(|message| match message {
            UserMessage::User { content, .. } => Some(format!("User: {}", truncate_chars(content, MAX_MESSAGE_CHARS))),
            UserMessage::Assistant { content, .. } => {
                Some(format!("Assistant: {}", truncate_chars(content, MAX_MESSAGE_CHARS)))
            }
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn truncate_chars(text: &str, max: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// First line of the model's answer without surrounding quotes or whitespace.
pub fn clean_title(raw: &str) -> String {
    const QUOTES: &[char] = &['"', '\'', '`', '\u{201c}', '\u{201d}', '\u{2018}', '\u{2019}', '*'];
    let line = raw.trim().lines().next().unwrap_or_default();
    let line = line.trim().trim_start_matches("Title:").trim();
    line.trim_matches(|c: char| QUOTES.contains(&c) || c.is_whitespace())
        .to_string()
}

/// Everything the task needs once the request is gone.
pub struct TitleJob {
    pub conversations: ConversationStore,
    pub provider: Arc<dyn LlmProvider>,
    pub model_slug: String,
    pub timeout: Duration,
}

impl TitleJob {
    async fn generate(&self, dialog: &str) -> AppResult<String> {
        let request = ChatRequest::new(
            self.model_slug.clone(),
            vec![
                ProviderMessage::system(TITLE_SYSTEM_PROMPT),
                ProviderMessage::User {
                    message_id: new_message_id(MessageKind::User),
                    content: dialog.to_string(),
                },
            ],
        );
        let raw = self.provider.complete(&request).await?;
        Ok(clean_title(&raw))
    }

    /// Start the task. `ctx` must be detached from the request.
    pub fn spawn(self, ctx: RequestContext, conversation_id: String, dialog: String) -> JoinHandle<()> {
        tokio::spawn(async move {
            let token = ctx.cancellation_token().clone();
            let outcome = tokio::select! {
                _ = token.cancelled() => {
                    debug!("[TitleTask] cancelled for {}", conversation_id);
                    return;
                }
                outcome = tokio::time::timeout(self.timeout, self.generate(&dialog)) => outcome,
            };

            match outcome {
                Err(_) => warn!(
                    "[TitleTask] timed out after {:?} for {}",
                    self.timeout, conversation_id
                ),
                Ok(Err(e)) => warn!("[TitleTask] failed for {}: {}", conversation_id, e),
                Ok(Ok(title)) if title.is_empty() => {
                    info!("[TitleTask] empty title for {}, keeping placeholder", conversation_id)
                }
                Ok(Ok(title)) => match self.conversations.replace_sentinel_title(&conversation_id, &title) {
                    Ok(true) => info!("[TitleTask] {} titled '{}'", conversation_id, title),
                    Ok(false) => info!("[TitleTask] {} already titled, keeping it", conversation_id),
                    Err(e) => warn!("[TitleTask] could not rename {}: {}", conversation_id, e),
                },
            }
        })
    }
}
