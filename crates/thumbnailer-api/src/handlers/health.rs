use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub backend: String,
    pub trigger_mode: String,
}

/// Liveness probe. Does not touch storage.
#[utoipa::path(
    get,
    path = "/healthz",
    tag = "config",
    responses((status = 200, description = "Service is running", body = HealthResponse))
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        backend: state.storage.backend_type().to_string(),
        trigger_mode: if state.trigger_queue.is_some() {
            "in-process".to_string()
        } else {
            "external".to_string()
        },
    })
}
