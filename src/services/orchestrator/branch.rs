//! Branch Edits
//!
//! Rewinds a conversation to a parent message before a new user turn is
//! appended.

use crate::models::{Conversation, ROOT_PARENT_ID};
use crate::utils::error::{AppError, AppResult};

/// Truncate both histories at `parent_message_id`.
///
/// - empty: no change
/// - `"root"`: keep only the system message
/// - a user-history id at index `i`: keep `user_history[..=i]` and the provider
///   prefix up to the last record carrying that id (`i + 1` when none does)
pub fn apply_branch(conv: &mut Conversation, parent_message_id: &str) -> AppResult<()> {
    let parent = parent_message_id.trim();
    if parent.is_empty() {
        return Ok(());
    }

    if parent == ROOT_PARENT_ID {
        conv.user_history.clear();
        conv.provider_history.truncate(1);
        return Ok(());
    }

    let Some(i) = conv
        .user_history
        .iter()
        .position(|message| message.message_id() == parent)
    else {
        return Err(AppError::bad_request(format!(
            "parent message {} not found in conversation {}",
            parent, conv.id
        )));
    };

    let last_provider = conv.provider_history.len().saturating_sub(1);
    let k = conv
        .provider_history
        .iter()
        .rposition(|message| message.message_id() == parent)
        .unwrap_or(i + 1)
        .min(last_provider);

    conv.user_history.truncate(i + 1);
    conv.provider_history.truncate(k + 1);
    Ok(())
}
