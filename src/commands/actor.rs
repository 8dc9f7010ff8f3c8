//! Actor Extraction
//!
//! The upstream JWT middleware forwards the verified principal in a header.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use paperdesk_core::Actor;

use crate::utils::error::AppError;

pub const ACTOR_HEADER: &str = "x-actor-id";

/// The calling user, taken from `x-actor-id`.
#[derive(Debug, Clone)]
pub struct CurrentActor(pub Actor);

impl<S> FromRequestParts<S> for CurrentActor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| AppError::invalid_actor(format!("missing {} header", ACTOR_HEADER)))?;
        Ok(CurrentActor(Actor::new(user_id)))
    }
}
