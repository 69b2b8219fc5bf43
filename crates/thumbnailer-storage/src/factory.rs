use crate::{LocalStorage, ObjectStoreStorage, Storage, StorageBackend, StorageError, StorageResult};
use std::sync::Arc;
use thumbnailer_core::{AzureConnectionString, Location, StorageConfig};

/// Create a storage backend based on configuration
pub async fn create_storage(config: &StorageConfig) -> StorageResult<Arc<dyn Storage>> {
    let source = config.container(Location::Source);
    let derived = config.container(Location::Derived);

    let storage: Arc<dyn Storage> = match config.backend {
        StorageBackend::Azure => {
            let raw = config.connection_string.as_deref().ok_or_else(|| {
                StorageError::ConfigError(
                    "STORAGE_CONNECTION_STRING not configured".to_string(),
                )
            })?;
            let connection = AzureConnectionString::parse(raw)
                .map_err(|e| StorageError::ConfigError(e.to_string()))?;
            Arc::new(ObjectStoreStorage::azure(
                &connection,
                source,
                derived,
                config.public_base_url.clone(),
            )?)
        }

        StorageBackend::S3 => {
            let bucket = config
                .s3_bucket
                .as_deref()
                .ok_or_else(|| StorageError::ConfigError("S3_BUCKET not configured".to_string()))?;
            let region = config.s3_region.as_deref().ok_or_else(|| {
                StorageError::ConfigError("S3_REGION or AWS_REGION not configured".to_string())
            })?;
            Arc::new(ObjectStoreStorage::s3(
                bucket,
                region,
                config.s3_endpoint.as_deref(),
                source,
                derived,
                config.public_base_url.clone(),
            )?)
        }

        StorageBackend::Local => {
            let base_path = config.local_storage_path.as_deref().ok_or_else(|| {
                StorageError::ConfigError("LOCAL_STORAGE_PATH not configured".to_string())
            })?;
            let base_url = config.public_base_url.clone().ok_or_else(|| {
                StorageError::ConfigError("PUBLIC_BASE_URL not configured".to_string())
            })?;
            Arc::new(LocalStorage::new(base_path, base_url, source, derived).await?)
        }

        StorageBackend::Memory => Arc::new(ObjectStoreStorage::in_memory(
            source,
            derived,
            config.public_base_url.clone(),
        )),
    };

    tracing::info!(
        backend = %config.backend,
        source_container = %source,
        derived_container = %derived,
        "Storage backend initialized"
    );

    Ok(storage)
}
