//! HTTP Commands
//!
//! Handlers behind the `/api/v1` router.

pub mod actor;
pub mod conversations;
pub mod health;
pub mod projects;
pub mod settings;

use axum::routing::{get, post, put};
use axum::Router;

use crate::state::AppState;

pub use actor::{CurrentActor, ACTOR_HEADER};

pub const API_PREFIX: &str = "/api/v1";

/// All routes, nested under `/api/v1`.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/conversations/stream", post(conversations::stream_conversation))
        .route("/conversations", get(conversations::list_conversations))
        .route(
            "/conversations/{id}",
            get(conversations::get_conversation)
                .patch(conversations::update_conversation)
                .delete(conversations::delete_conversation),
        )
        .route("/projects/{id}", put(projects::upsert_project))
        .route("/projects/{id}/citation-keys", get(projects::get_citation_keys))
        .route(
            "/users/me/settings",
            get(settings::get_settings).put(settings::update_settings),
        )
        .route("/health", get(health::get_health));

    Router::new().nest(API_PREFIX, api).with_state(state)
}
