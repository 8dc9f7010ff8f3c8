//! Health Check
//!
//! Reports database reachability and the number of registered tools.

use axum::extract::State;
use axum::Json;

use crate::models::HealthResponse;
use crate::state::AppState;

/// Get the health status of the backend
pub async fn get_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let mut health = HealthResponse::default();
    health.database = state.is_database_healthy();
    health.tools = state.orchestrator().tools().len();
    if !health.database {
        health.status = "degraded".to_string();
    }
    Json(health)
}
