//! Route configuration and setup

use crate::constants::{API_PREFIX, MULTIPART_OVERHEAD_BYTES};
use crate::handlers;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::Method,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Setup all application routes
pub fn setup_routes(state: Arc<AppState>) -> Router<()> {
    // Multipart needs the framing slack on top of the largest accepted file;
    // the validator still enforces the exact limit on the file itself.
    let body_limit = state.config.upload.max_file_size_bytes + MULTIPART_OVERHEAD_BYTES;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/healthz", get(handlers::health::health_check))
        .route(
            "/api-docs/openapi.json",
            get(|| async { Json(crate::api_doc::get_openapi_spec()) }),
        )
        .merge(api_routes())
        .merge(file_routes())
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/upload", API_PREFIX),
            post(handlers::upload::upload_image),
        )
        .route(
            &format!("{}/list", API_PREFIX),
            get(handlers::list::list_thumbnails),
        )
        .route(
            &format!("{}/events", API_PREFIX),
            post(handlers::events::receive_events),
        )
}

/// Download route behind the URLs of backends that are not publicly served
/// (local filesystem, in-memory).
fn file_routes() -> Router<Arc<AppState>> {
    Router::new().route(
        "/files/{container}/{*key}",
        get(handlers::files::download_object),
    )
}
