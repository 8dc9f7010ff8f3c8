//! Conversation Store
//!
//! Persists conversations with both histories. Every read filters on the owner
//! and on `deleted_at IS NULL`; updates replace the whole document in a single
//! statement so readers see both histories change together.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use paperdesk_core::{ProviderMessage, UserMessage};

use crate::models::{Conversation, SENTINEL_TITLE};
use crate::storage::database::{format_timestamp, parse_timestamp, Database};
use crate::utils::error::{AppError, AppResult};

/// Raw conversation row from the database
#[derive(Debug, Clone)]
struct ConversationRow {
    id: String,
    owner_id: String,
    project_id: String,
    title: String,
    model_slug: String,
    user_history: Option<String>,
    provider_history: Option<String>,
    created_at: String,
    updated_at: String,
    deleted_at: Option<String>,
}

impl ConversationRow {
    fn into_conversation(self) -> AppResult<Conversation> {
        let user_history: Vec<UserMessage> = match self.user_history {
            Some(json) => serde_json::from_str(&json)?,
            None => Vec::new(),
        };
        let provider_history: Vec<ProviderMessage> = match self.provider_history {
            Some(json) => serde_json::from_str(&json)?,
            None => Vec::new(),
        };
        Ok(Conversation {
            id: self.id,
            owner_id: self.owner_id,
            project_id: self.project_id,
            title: self.title,
            model_slug: self.model_slug,
            user_history,
            provider_history,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            deleted_at: self.deleted_at.as_deref().map(parse_timestamp).transpose()?,
        })
    }
}

/// Conversation persistence
#[derive(Debug, Clone)]
pub struct ConversationStore {
    db: Database,
}

impl ConversationStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert a new conversation with the sentinel title.
    pub fn create(
        &self,
        owner_id: &str,
        project_id: &str,
        model_slug: &str,
        initial_user: Vec<UserMessage>,
        initial_provider: Vec<ProviderMessage>,
    ) -> AppResult<Conversation> {
        let conv = Conversation::new(owner_id, project_id, model_slug, initial_user, initial_provider);
        conv.check_consistency()?;

        let conn = self.db.get_connection()?;
        conn.execute(
            "INSERT INTO conversations (id, owner_id, project_id, title, model_slug,
                user_history, provider_history, created_at, updated_at, deleted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, NULL)",
            params![
                conv.id,
                conv.owner_id,
                conv.project_id,
                conv.title,
                conv.model_slug,
                serde_json::to_string(&conv.user_history)?,
                serde_json::to_string(&conv.provider_history)?,
                format_timestamp(&conv.created_at),
                format_timestamp(&conv.updated_at),
            ],
        )?;

        Ok(conv)
    }

    /// Load a live conversation owned by `owner_id`.
    pub fn get(&self, owner_id: &str, id: &str) -> AppResult<Conversation> {
        let conn = self.db.get_connection()?;
        let row = conn
            .query_row(
                "SELECT id, owner_id, project_id, title, model_slug, user_history, provider_history,
                        created_at, updated_at, deleted_at
                 FROM conversations
                 WHERE id = ?1 AND owner_id = ?2 AND deleted_at IS NULL",
                params![id, owner_id],
                Self::row_to_conversation,
            )
            .optional()?;

        match row {
            Some(row) => row.into_conversation(),
            None => Err(AppError::not_found(format!("conversation {}", id))),
        }
    }

    /// Live conversations of one project, newest update first, histories left empty.
    pub fn list(&self, owner_id: &str, project_id: &str) -> AppResult<Vec<Conversation>> {
        let conn = self.db.get_connection()?;
        let mut stmt = conn.prepare(
            "SELECT id, owner_id, project_id, title, model_slug, NULL, NULL,
                    created_at, updated_at, deleted_at
             FROM conversations
             WHERE owner_id = ?1 AND project_id = ?2 AND deleted_at IS NULL
             ORDER BY updated_at DESC, id",
        )?;

        let rows = stmt
            .query_map(params![owner_id, project_id], Self::row_to_conversation)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(ConversationRow::into_conversation).collect()
    }

    /// Replace the histories and model, bump `updated_at`.
    ///
    /// The title is left to `rename` and `replace_sentinel_title`; `conv.title`
    /// is refreshed from the stored row. Last writer wins. Fails with
    /// `record_not_found` if the conversation was deleted or belongs to
    /// someone else.
    pub fn update(&self, conv: &mut Conversation) -> AppResult<()> {
        conv.check_consistency()?;
        conv.updated_at = Utc::now();

        let conn = self.db.get_connection()?;
        let changed = conn.execute(
            "UPDATE conversations
             SET model_slug = ?1, user_history = ?2, provider_history = ?3, updated_at = ?4
             WHERE id = ?5 AND owner_id = ?6 AND deleted_at IS NULL",
            params![
                conv.model_slug,
                serde_json::to_string(&conv.user_history)?,
                serde_json::to_string(&conv.provider_history)?,
                format_timestamp(&conv.updated_at),
                conv.id,
                conv.owner_id,
            ],
        )?;

        if changed == 0 {
            return Err(AppError::not_found(format!("conversation {}", conv.id)));
        }
        conv.title = conn.query_row(
            "SELECT title FROM conversations WHERE id = ?1",
            params![conv.id],
            |row| row.get(0),
        )?;
        Ok(())
    }

    /// Mark a conversation deleted. A second delete is `record_not_found`.
    pub fn soft_delete(&self, owner_id: &str, id: &str) -> AppResult<()> {
        let conn = self.db.get_connection()?;
        let changed = conn.execute(
            "UPDATE conversations SET deleted_at = ?1
             WHERE id = ?2 AND owner_id = ?3 AND deleted_at IS NULL",
            params![format_timestamp(&Utc::now()), id, owner_id],
        )?;

        if changed == 0 {
            return Err(AppError::not_found(format!("conversation {}", id)));
        }
        Ok(())
    }

    /// Set the title of a live conversation.
    pub fn rename(&self, id: &str, title: &str) -> AppResult<()> {
        let conn = self.db.get_connection()?;
        let changed = conn.execute(
            "UPDATE conversations SET title = ?1, updated_at = ?2
             WHERE id = ?3 AND deleted_at IS NULL",
            params![title, format_timestamp(&Utc::now()), id],
        )?;

        if changed == 0 {
            return Err(AppError::not_found(format!("conversation {}", id)));
        }
        Ok(())
    }

    /// Set a generated title unless the conversation was renamed meanwhile.
    /// Returns whether the title changed.
    pub fn replace_sentinel_title(&self, id: &str, title: &str) -> AppResult<bool> {
        let conn = self.db.get_connection()?;
        let changed = conn.execute(
            "UPDATE conversations SET title = ?1, updated_at = ?2
             WHERE id = ?3 AND title = ?4 AND deleted_at IS NULL",
            params![title, format_timestamp(&Utc::now()), id, SENTINEL_TITLE],
        )?;
        Ok(changed > 0)
    }

    fn row_to_conversation(row: &rusqlite::Row) -> rusqlite::Result<ConversationRow> {
        Ok(ConversationRow {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            project_id: row.get(2)?,
            title: row.get(3)?,
            model_slug: row.get(4)?,
            user_history: row.get(5)?,
            provider_history: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
            deleted_at: row.get(9)?,
        })
    }
}
