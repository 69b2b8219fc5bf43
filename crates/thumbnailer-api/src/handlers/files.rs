//! Serves stored objects for backends whose URLs point back at this service.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
};
use futures::StreamExt;
use thumbnailer_core::{AppError, Location};

use crate::error::HttpAppError;
use crate::state::AppState;

#[tracing::instrument(skip(state), fields(operation = "download_object"))]
pub async fn download_object(
    State(state): State<Arc<AppState>>,
    Path((container, key)): Path<(String, String)>,
) -> Result<Response, HttpAppError> {
    let storage_config = &state.config.storage;
    let location = if container == storage_config.source_container {
        Location::Source
    } else if container == storage_config.derived_container {
        Location::Derived
    } else {
        return Err(AppError::NotFound(format!("Unknown container: {}", container)).into());
    };

    let stream = state.storage.get(location, &key).await?;
    let body_stream = stream.map(|result| {
        result.map_err(|e| std::io::Error::other(format!("Storage stream error: {}", e)))
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type_for(&key))
        .header(header::CACHE_CONTROL, "public, max-age=3600")
        .body(Body::from_stream(body_stream))
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to build response");
            HttpAppError::from(AppError::Internal(e.to_string()))
        })
}

fn content_type_for(key: &str) -> &'static str {
    let extension = key
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}
