use crate::keys::ensure_key_safe;
use crate::traits::{ByteStream, ObjectListing, Storage, StorageError, StorageResult};
use crate::{Location, ObjectDescriptor, StorageBackend};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use object_store::aws::AmazonS3Builder;
use object_store::azure::MicrosoftAzureBuilder;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::prefix::PrefixStore;
use object_store::Error as ObjectStoreError;
use object_store::{ObjectStore, ObjectStoreExt, PutMode, PutOptions, PutPayload};
use std::sync::Arc;
use thumbnailer_core::AzureConnectionString;

/// Storage backed by the `object_store` crate.
///
/// Each location maps to its own store: one blob container per location on
/// Azure, one key prefix per location inside a single bucket on S3, and one
/// `InMemory` store per location for the memory backend. Single-request puts
/// are atomic on every one of these services.
#[derive(Clone)]
pub struct ObjectStoreStorage {
    source: Arc<dyn ObjectStore>,
    derived: Arc<dyn ObjectStore>,
    source_container: String,
    derived_container: String,
    public_base_url: String,
    backend: StorageBackend,
}

impl ObjectStoreStorage {
    /// Wrap two existing stores.
    pub fn new(
        backend: StorageBackend,
        source: Arc<dyn ObjectStore>,
        derived: Arc<dyn ObjectStore>,
        source_container: impl Into<String>,
        derived_container: impl Into<String>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            source,
            derived,
            source_container: source_container.into(),
            derived_container: derived_container.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
            backend,
        }
    }

    /// Azure Blob Storage, one container per location.
    pub fn azure(
        connection: &AzureConnectionString,
        source_container: &str,
        derived_container: &str,
        public_base_url: Option<String>,
    ) -> StorageResult<Self> {
        let build = |container: &str| -> StorageResult<Arc<dyn ObjectStore>> {
            let mut builder = MicrosoftAzureBuilder::new()
                .with_account(connection.account_name.clone())
                .with_container_name(container);

            if connection.use_emulator {
                builder = builder.with_use_emulator(true);
            } else if let Some(ref endpoint) = connection.blob_endpoint {
                builder = builder
                    .with_endpoint(endpoint.clone())
                    .with_allow_http(endpoint.starts_with("http://"));
            }
            if let Some(ref key) = connection.account_key {
                builder = builder.with_access_key(key.clone());
            }

            let store = builder
                .build()
                .map_err(|e| StorageError::ConfigError(e.to_string()))?;
            Ok(Arc::new(store))
        };

        Ok(Self::new(
            StorageBackend::Azure,
            build(source_container)?,
            build(derived_container)?,
            source_container,
            derived_container,
            public_base_url.unwrap_or_else(|| connection.public_base_url()),
        ))
    }

    /// S3 or an S3-compatible provider; locations are key prefixes in one bucket.
    ///
    /// # Arguments
    /// * `endpoint_url` - Optional custom endpoint for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    pub fn s3(
        bucket: &str,
        region: &str,
        endpoint_url: Option<&str>,
        source_container: &str,
        derived_container: &str,
        public_base_url: Option<String>,
    ) -> StorageResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region)
            .with_bucket_name(bucket);

        if let Some(endpoint) = endpoint_url {
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(endpoint.starts_with("http://"));
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        // Path-style for custom endpoints, virtual-hosted style for AWS.
        let default_url = match endpoint_url {
            Some(endpoint) => format!("{}/{}", endpoint.trim_end_matches('/'), bucket),
            None => format!("https://{}.s3.{}.amazonaws.com", bucket, region),
        };

        Ok(Self::new(
            StorageBackend::S3,
            Arc::new(PrefixStore::new(store.clone(), source_container)),
            Arc::new(PrefixStore::new(store, derived_container)),
            source_container,
            derived_container,
            public_base_url.unwrap_or(default_url),
        ))
    }

    /// Process-local store; contents vanish with the process.
    pub fn in_memory(
        source_container: &str,
        derived_container: &str,
        public_base_url: Option<String>,
    ) -> Self {
        Self::new(
            StorageBackend::Memory,
            Arc::new(InMemory::new()),
            Arc::new(InMemory::new()),
            source_container,
            derived_container,
            public_base_url.unwrap_or_else(|| "memory://".to_string()),
        )
    }

    fn store(&self, location: Location) -> &Arc<dyn ObjectStore> {
        match location {
            Location::Source => &self.source,
            Location::Derived => &self.derived,
        }
    }

    fn container(&self, location: Location) -> &str {
        match location {
            Location::Source => &self.source_container,
            Location::Derived => &self.derived_container,
        }
    }

    fn object_path(key: &str) -> StorageResult<Path> {
        ensure_key_safe(key)?;
        Path::parse(key).map_err(|e| StorageError::InvalidKey(e.to_string()))
    }
}

/// Classify an `object_store` failure for callers of the gateway.
fn map_error(err: ObjectStoreError, key: &str) -> StorageError {
    match err {
        ObjectStoreError::NotFound { .. } => StorageError::NotFound(key.to_string()),
        ObjectStoreError::AlreadyExists { .. } | ObjectStoreError::Precondition { .. } => {
            StorageError::AlreadyExists(key.to_string())
        }
        ObjectStoreError::InvalidPath { source } => StorageError::InvalidKey(source.to_string()),
        e @ (ObjectStoreError::PermissionDenied { .. }
        | ObjectStoreError::Unauthenticated { .. }) => StorageError::AccessDenied(e.to_string()),
        e @ (ObjectStoreError::NotSupported { .. } | ObjectStoreError::NotImplemented { .. }) => {
            StorageError::Unsupported(e.to_string())
        }
        e @ ObjectStoreError::UnknownConfigurationKey { .. } => {
            StorageError::ConfigError(e.to_string())
        }
        other => StorageError::Transient(other.to_string()),
    }
}

#[async_trait]
impl Storage for ObjectStoreStorage {
    async fn put(
        &self,
        location: Location,
        key: &str,
        content: ByteStream,
        overwrite: bool,
    ) -> StorageResult<String> {
        let path = Self::object_path(key)?;
        let start = std::time::Instant::now();

        // A single put request is what makes the write atomic, so the content
        // is gathered before anything reaches the service.
        let chunks: Vec<Bytes> = content.try_collect().await?;
        let payload = PutPayload::from_iter(chunks);
        let size = payload.content_length();

        let mode = if overwrite {
            PutMode::Overwrite
        } else {
            PutMode::Create
        };

        self.store(location)
            .put_opts(&path, payload, PutOptions::from(mode))
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    backend = %self.backend,
                    container = %self.container(location),
                    key = %key,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Object store put failed"
                );
                map_error(e, key)
            })?;

        tracing::info!(
            backend = %self.backend,
            container = %self.container(location),
            key = %key,
            size_bytes = size,
            overwrite,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object store put successful"
        );

        Ok(self.build_url(location, key))
    }

    async fn get(&self, location: Location, key: &str) -> StorageResult<ByteStream> {
        let path = Self::object_path(key)?;

        let result = self
            .store(location)
            .get(&path)
            .await
            .map_err(|e| map_error(e, key))?;

        let backend = self.backend;
        let owned_key = key.to_string();
        let stream = result.into_stream().map(move |chunk| {
            chunk.map_err(|e| {
                tracing::warn!(
                    error = %e,
                    backend = %backend,
                    key = %owned_key,
                    "Object store read interrupted"
                );
                map_error(e, &owned_key)
            })
        });

        Ok(Box::pin(stream))
    }

    fn list(&self, location: Location, prefix: &str) -> ObjectListing {
        // object_store matches prefixes on whole path segments, so list the
        // enclosing directory and filter on the raw string prefix.
        let dir = match prefix.rfind('/') {
            Some(idx) => &prefix[..idx],
            None => "",
        };
        let dir_path = if dir.is_empty() {
            None
        } else {
            match Path::parse(dir) {
                Ok(path) => Some(path),
                Err(e) => {
                    let err = StorageError::InvalidKey(e.to_string());
                    return Box::pin(futures::stream::once(async move { Err(err) }));
                }
            }
        };

        let prefix = prefix.to_string();
        let this = self.clone();
        let stream = self
            .store(location)
            .list(dir_path.as_ref())
            .map_err(|e| map_error(e, ""))
            .try_filter(move |meta| {
                let keep = meta.location.as_ref().starts_with(&prefix);
                async move { keep }
            })
            .map_ok(move |meta| {
                let key = meta.location.to_string();
                ObjectDescriptor {
                    url: this.build_url(location, &key),
                    key,
                    size_bytes: Some(meta.size),
                    last_modified: Some(meta.last_modified),
                }
            });

        Box::pin(stream)
    }

    fn build_url(&self, location: Location, key: &str) -> String {
        format!(
            "{}/{}/{}",
            self.public_base_url,
            self.container(location),
            key
        )
    }

    fn backend_type(&self) -> StorageBackend {
        self.backend
    }
}
