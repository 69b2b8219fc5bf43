use std::sync::Arc;

use axum::{extract::State, Json};
use futures::TryStreamExt;
use thumbnailer_core::{AppError, Location, ThumbnailEntry};

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

/// List every thumbnail in the derived location
///
/// Entries come back in storage listing order. The listing is drained
/// completely before responding: a failure part-way yields an error, never a
/// truncated array. Every listing failure is a 500.
#[utoipa::path(
    get,
    path = "/api/list",
    tag = "images",
    responses(
        (status = 200, description = "All thumbnails", body = Vec<ThumbnailEntry>),
        (status = 500, description = "Listing failed", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(operation = "list_thumbnails"))]
pub async fn list_thumbnails(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ThumbnailEntry>>, HttpAppError> {
    let start = std::time::Instant::now();

    let entries: Vec<ThumbnailEntry> = state
        .storage
        .list(Location::Derived, "")
        .map_ok(ThumbnailEntry::from)
        .try_collect()
        .await
        .map_err(|e| AppError::Storage(format!("Failed to list thumbnails: {}", e)))?;

    tracing::debug!(
        count = entries.len(),
        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Thumbnails listed"
    );

    Ok(Json(entries))
}
