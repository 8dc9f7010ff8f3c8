//! Project Commands
//!
//! Snapshot ingestion and citation key lookup.

use axum::extract::{Path, State};
use axum::Json;
use tracing::info;

use crate::commands::actor::CurrentActor;
use crate::models::{CitationKeysResponse, ProjectSummary, ProjectUpsert};
use crate::state::AppState;
use crate::utils::error::{AppError, AppResult};

/// `PUT /projects/{id}`
pub async fn upsert_project(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(project_id): Path<String>,
    Json(body): Json<ProjectUpsert>,
) -> AppResult<Json<ProjectSummary>> {
    if project_id.trim().is_empty() {
        return Err(AppError::bad_request("project id is required"));
    }
    let snapshot = body.into_snapshot(project_id, actor.user_id);
    state.projects().upsert(&snapshot)?;

    let summary = ProjectSummary::from(&snapshot);
    info!(
        "[Http] project {} stored with {} documents",
        summary.id, summary.documents
    );
    Ok(Json(summary))
}

/// `GET /projects/{id}/citation-keys`
pub async fn get_citation_keys(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(project_id): Path<String>,
) -> AppResult<Json<CitationKeysResponse>> {
    let project = state.projects().get(&actor.user_id, &project_id)?;
    Ok(Json(CitationKeysResponse {
        keys: project.citation_keys(),
        project_id,
    }))
}
