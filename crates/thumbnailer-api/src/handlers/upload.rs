use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use serde::Serialize;
use thumbnailer_core::{AppError, Location, TriggerEvent};
use thumbnailer_storage::derive_source_key;
use utoipa::ToSchema;

use crate::constants::UPLOAD_FIELD;
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResponse {
    /// Source key the image was stored under.
    pub key: String,
    pub url: String,
}

struct UploadedFile {
    filename: String,
    content_type: String,
    data: Bytes,
}

/// Upload an image into the source location
///
/// The client filename becomes part of the key behind a unique token, so
/// concurrent uploads of the same name never collide. A thumbnail is derived
/// asynchronously once the storage creation event is delivered.
#[utoipa::path(
    post,
    path = "/api/upload",
    tag = "images",
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Image stored", body = UploadResponse),
        (status = 400, description = "Missing file field or invalid file", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, multipart), fields(operation = "upload_image"))]
pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, HttpAppError> {
    let Some(file) = read_file_field(&mut multipart).await? else {
        return Err(AppError::BadRequest(format!(
            "Missing multipart field '{}'",
            UPLOAD_FIELD
        ))
        .into());
    };

    state
        .validator
        .validate_all(&file.filename, &file.content_type, file.data.len())?;

    let key = derive_source_key(&file.filename);
    let size_bytes = file.data.len();
    let url = state
        .storage
        .put_bytes(Location::Source, &key, file.data, true)
        .await?;

    tracing::info!(
        key = %key,
        content_type = %file.content_type,
        size_bytes,
        "Source image stored"
    );

    if let Some(queue) = &state.trigger_queue {
        // The object is already durable; a lost event is recovered by reprocessing.
        if let Err(e) = queue.publish(TriggerEvent::new(key.clone())).await {
            tracing::error!(key = %key, error = %e, "Failed to publish creation event");
        }
    }

    Ok(Json(UploadResponse { key, url }))
}

/// Read the first `file` field, skipping any others.
async fn read_file_field(multipart: &mut Multipart) -> Result<Option<UploadedFile>, HttpAppError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field.bytes().await.map_err(multipart_error)?;

        return Ok(Some(UploadedFile {
            filename,
            content_type,
            data,
        }));
    }
    Ok(None)
}

fn multipart_error(err: MultipartError) -> HttpAppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text()).into()
    } else {
        AppError::BadRequest(format!("Invalid multipart body: {}", err.body_text())).into()
    }
}
