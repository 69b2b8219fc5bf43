//! Application setup and initialization

pub mod routes;
pub mod server;
pub mod storage;

use crate::state::AppState;
use anyhow::{Context, Result};
use std::sync::Arc;
use thumbnailer_core::{Config, TriggerMode};
use thumbnailer_processing::MediaValidator;
use thumbnailer_storage::Storage;
use thumbnailer_worker::{DerivativePipeline, PipelineConfig, TriggerQueue, TriggerQueueConfig};

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    config.validate().context("Configuration validation failed")?;

    crate::telemetry::init_telemetry(&config.log_format)
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    tracing::info!("Configuration loaded and validated successfully");

    let storage = storage::setup_storage(&config).await?;

    let state = build_state(config, storage);

    let router = routes::setup_routes(state.clone());

    Ok((state, router))
}

/// Wire the pipeline, validator and (when needed) the trigger queue around a
/// storage gateway.
///
/// Must run inside a Tokio runtime: the trigger queue spawns its worker pool.
pub fn build_state(config: Config, storage: Arc<dyn Storage>) -> Arc<AppState> {
    let pipeline = Arc::new(DerivativePipeline::new(
        storage.clone(),
        PipelineConfig::from(&config),
    ));

    let trigger_queue = match config.trigger.mode {
        TriggerMode::InProcess => {
            let queue_config = TriggerQueueConfig::from(&config.trigger);
            tracing::info!(
                max_workers = queue_config.max_workers,
                max_deliveries = queue_config.max_deliveries,
                "Delivering creation events in-process"
            );
            Some(TriggerQueue::new(pipeline.clone(), queue_config, None))
        }
        TriggerMode::External => {
            tracing::info!("Creation events are delivered by the storage platform");
            None
        }
    };

    Arc::new(AppState {
        validator: MediaValidator::from_config(&config.upload),
        config,
        storage,
        pipeline,
        trigger_queue,
    })
}
