//! Project Snapshot Store
//!
//! Snapshots are upserted by the ingestion pipeline and read by the
//! orchestrator and the project tools.

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};

use paperdesk_tools::{ProjectAccess, ToolError, ToolResult};

use crate::models::{Folder, ProjectSnapshot};
use crate::storage::database::{format_timestamp, parse_timestamp, Database};
use crate::utils::error::{AppError, AppResult};

/// Project snapshot persistence
#[derive(Debug, Clone)]
pub struct ProjectStore {
    db: Database,
}

impl ProjectStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Load a snapshot regardless of owner.
    pub fn find(&self, id: &str) -> AppResult<Option<ProjectSnapshot>> {
        let conn = self.db.get_connection()?;
        let row = conn
            .query_row(
                "SELECT id, owner_id, name, root_doc_id, root_folder, instructions, updated_at
                 FROM projects WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, String>(6)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, owner_id, name, root_doc_id, root_folder, instructions, updated_at)) = row else {
            return Ok(None);
        };
        let root_folder: Folder = serde_json::from_str(&root_folder)?;
        Ok(Some(ProjectSnapshot {
            id,
            owner_id,
            name,
            root_doc_id,
            root_folder,
            instructions,
            updated_at: parse_timestamp(&updated_at)?,
        }))
    }

    /// Load a snapshot owned by `owner_id`.
    pub fn get(&self, owner_id: &str, id: &str) -> AppResult<ProjectSnapshot> {
        match self.find(id)? {
            Some(project) if project.owner_id == owner_id => Ok(project),
            _ => Err(AppError::not_found(format!("project {}", id))),
        }
    }

    /// Insert or replace a snapshot. A project owned by someone else is not visible.
    pub fn upsert(&self, project: &ProjectSnapshot) -> AppResult<()> {
        if let Some(existing) = self.find(&project.id)? {
            if existing.owner_id != project.owner_id {
                return Err(AppError::not_found(format!("project {}", project.id)));
            }
        }

        let conn = self.db.get_connection()?;
        conn.execute(
            "INSERT INTO projects (id, owner_id, name, root_doc_id, root_folder, instructions, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                name = ?3, root_doc_id = ?4, root_folder = ?5, instructions = ?6, updated_at = ?7",
            params![
                project.id,
                project.owner_id,
                project.name,
                project.root_doc_id,
                serde_json::to_string(&project.root_folder)?,
                project.instructions,
                format_timestamp(&project.updated_at),
            ],
        )?;
        Ok(())
    }
}

#[async_trait]
impl ProjectAccess for ProjectStore {
    async fn verify_owner(&self, user_id: &str, project_id: &str) -> ToolResult<()> {
        match self.find(project_id) {
            Ok(Some(project)) if project.owner_id == user_id => Ok(()),
            Ok(_) => Err(ToolError::permission_denied(format!(
                "project {} is not accessible",
                project_id
            ))),
            Err(e) => Err(ToolError::execution(e.to_string())),
        }
    }
}
