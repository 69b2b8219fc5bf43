//! Operator commands. Each works directly against the storage gateway and the
//! pipeline, without going through the HTTP service.

mod reprocess;

pub use reprocess::{reprocess, ReprocessSummary};

use anyhow::{Context, Result};
use bytes::Bytes;
use futures::TryStreamExt;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use thumbnailer_core::{Location, ObjectDescriptor, TriggerEvent};
use thumbnailer_processing::MediaValidator;
use thumbnailer_storage::{derive_source_key, Storage};
use thumbnailer_worker::{DerivativePipeline, PipelineOutcome};

#[derive(Debug, Serialize)]
pub struct UploadResult {
    pub key: String,
    pub url: String,
}

/// Store a local file in the source location under a fresh source key.
pub async fn upload(
    storage: &Arc<dyn Storage>,
    validator: &MediaValidator,
    path: &Path,
) -> Result<UploadResult> {
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("Path has no usable file name: {}", path.display()))?;
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    validator.validate_all(filename, content_type_for(filename), data.len())?;

    let key = derive_source_key(filename);
    let url = storage
        .put_bytes(Location::Source, &key, Bytes::from(data), true)
        .await
        .with_context(|| format!("Failed to store {}", key))?;

    tracing::info!(key = %key, "Source image stored");
    Ok(UploadResult { key, url })
}

/// Collect the full listing of a location. Fails rather than returning a
/// partial list.
pub async fn list(
    storage: &Arc<dyn Storage>,
    location: Location,
    prefix: &str,
) -> Result<Vec<ObjectDescriptor>> {
    storage
        .list(location, prefix)
        .try_collect()
        .await
        .with_context(|| format!("Failed to list {} objects", location))
}

/// Run the pipeline once for `source_key`, as a single event delivery.
pub async fn handle(pipeline: &DerivativePipeline, source_key: &str) -> Result<PipelineOutcome> {
    let outcome = pipeline.handle(&TriggerEvent::new(source_key)).await?;
    Ok(outcome)
}

fn content_type_for(filename: &str) -> &'static str {
    let extension = filename
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
