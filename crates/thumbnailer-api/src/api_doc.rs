//! OpenAPI documentation, served at `/api-docs/openapi.json`.

use utoipa::OpenApi;

use crate::error;
use crate::handlers;
use thumbnailer_core::models;

pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Thumbnailer API",
        version = "0.1.0",
        description = "Image upload into durable storage, automatic thumbnail derivation, and thumbnail listing."
    ),
    paths(
        handlers::upload::upload_image,
        handlers::list::list_thumbnails,
        handlers::events::receive_events,
        handlers::health::health_check,
    ),
    components(
        schemas(
            handlers::upload::UploadResponse,
            models::ThumbnailEntry,
            models::TriggerEvent,
            handlers::events::BlobCreatedEvent,
            handlers::events::EventsResponse,
            handlers::events::EventResult,
            handlers::events::EventStatus,
            handlers::health::HealthResponse,
            error::ErrorResponse,
        )
    ),
    tags(
        (name = "images", description = "Image upload and thumbnail listing"),
        (name = "events", description = "Storage creation event intake"),
        (name = "config", description = "Service health")
    )
)]
pub struct ApiDoc;
