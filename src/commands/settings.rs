//! Settings Commands
//!
//! The caller's own settings and writing instructions. Keys are never echoed
//! back in full.

use axum::extract::State;
use axum::Json;

use crate::commands::actor::CurrentActor;
use crate::models::UserSettings;
use crate::state::AppState;
use crate::utils::error::AppResult;

/// `GET /users/me/settings`
pub async fn get_settings(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> AppResult<Json<UserSettings>> {
    let settings = state.users().get_settings(&actor.user_id)?;
    Ok(Json(settings.redacted()))
}

/// `PUT /users/me/settings`, replacing the whole document
pub async fn update_settings(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(settings): Json<UserSettings>,
) -> AppResult<Json<UserSettings>> {
    state.users().put_settings(&actor.user_id, &settings)?;
    Ok(Json(settings.redacted()))
}
