//! Response Types
//!
//! Bodies of the unary HTTP endpoints that have no model of their own.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::ProjectSnapshot;

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub service: String,
    pub database: bool,
    pub tools: usize,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            service: "paperdesk-server".to_string(),
            database: false,
            tools: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitationKeysResponse {
    pub project_id: String,
    pub keys: Vec<String>,
}

/// Acknowledgement of a project snapshot write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub id: String,
    pub name: String,
    pub documents: usize,
    pub updated_at: DateTime<Utc>,
}

impl From<&ProjectSnapshot> for ProjectSummary {
    fn from(project: &ProjectSnapshot) -> Self {
        Self {
            id: project.id.clone(),
            name: project.name.clone(),
            documents: project.documents().len(),
            updated_at: project.updated_at,
        }
    }
}
