//! Storage setup and initialization

use anyhow::{Context, Result};
use std::sync::Arc;
use thumbnailer_core::Config;
use thumbnailer_storage::{create_storage, Storage};

pub async fn setup_storage(config: &Config) -> Result<Arc<dyn Storage>> {
    tracing::info!("Initializing storage gateway...");
    let storage = create_storage(&config.storage)
        .await
        .context("Failed to create storage backend")?;
    tracing::info!(
        backend = %storage.backend_type(),
        source_container = %config.storage.source_container,
        derived_container = %config.storage.derived_container,
        "Storage gateway initialized successfully"
    );
    Ok(storage)
}
