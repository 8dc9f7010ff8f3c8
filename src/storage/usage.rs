//! Usage Records
//!
//! One row per provider round of a conversation turn.

use chrono::Utc;
use rusqlite::params;
use serde::{Deserialize, Serialize};

use crate::storage::database::{format_timestamp, Database};
use crate::utils::error::AppResult;

/// Token usage of one provider round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub user_id: String,
    pub project_id: String,
    pub conversation_id: String,
    pub model_slug: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// Aggregated usage of one user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageTotals {
    pub rounds: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

#[derive(Debug, Clone)]
pub struct UsageStore {
    db: Database,
}

impl UsageStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn record(&self, usage: &UsageRecord) -> AppResult<()> {
        let conn = self.db.get_connection()?;
        conn.execute(
            "INSERT INTO usages (user_id, project_id, conversation_id, model_slug,
                prompt_tokens, completion_tokens, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                usage.user_id,
                usage.project_id,
                usage.conversation_id,
                usage.model_slug,
                usage.prompt_tokens as i64,
                usage.completion_tokens as i64,
                format_timestamp(&Utc::now()),
            ],
        )?;
        Ok(())
    }

    pub fn totals(&self, user_id: &str) -> AppResult<UsageTotals> {
        let conn = self.db.get_connection()?;
        let (rounds, prompt, completion): (i64, i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(prompt_tokens), 0), COALESCE(SUM(completion_tokens), 0)
             FROM usages WHERE user_id = ?1",
            params![user_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;
        Ok(UsageTotals {
            rounds: rounds.max(0) as u64,
            prompt_tokens: prompt.max(0) as u64,
            completion_tokens: completion.max(0) as u64,
        })
    }

    /// Records of one conversation, oldest first.
    pub fn for_conversation(&self, conversation_id: &str) -> AppResult<Vec<UsageRecord>> {
        let conn = self.db.get_connection()?;
        let mut stmt = conn.prepare(
            "SELECT user_id, project_id, conversation_id, model_slug, prompt_tokens, completion_tokens
             FROM usages WHERE conversation_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![conversation_id], |row| {
                Ok(UsageRecord {
                    user_id: row.get(0)?,
                    project_id: row.get(1)?,
                    conversation_id: row.get(2)?,
                    model_slug: row.get(3)?,
                    prompt_tokens: row.get::<_, i64>(4)?.max(0) as u64,
                    completion_tokens: row.get::<_, i64>(5)?.max(0) as u64,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
