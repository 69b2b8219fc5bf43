//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use crate::{Location, ObjectDescriptor, StorageBackend};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use std::pin::Pin;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Object already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    /// Network or service failure that may succeed when retried.
    #[error("Transient storage error: {0}")]
    Transient(String),

    /// Credentials missing, expired, or lacking permission.
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// The service does not support the requested operation.
    #[error("Unsupported storage operation: {0}")]
    Unsupported(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl StorageError {
    /// Whether retrying the same operation later can succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Transient(_) | StorageError::Io(_))
    }

    /// Whether the backend itself is misconfigured, so no request succeeds
    /// until an operator intervenes.
    pub fn is_misconfiguration(&self) -> bool {
        matches!(
            self,
            StorageError::AccessDenied(_)
                | StorageError::Unsupported(_)
                | StorageError::ConfigError(_)
        )
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Object content as a stream of chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// Lazy, finite listing. Not restartable: list again for a fresh pass.
pub type ObjectListing = Pin<Box<dyn Stream<Item = Result<ObjectDescriptor, StorageError>> + Send>>;

/// Storage abstraction trait
///
/// All backends (local filesystem, Azure Blob, S3, in-memory) implement this
/// trait, so ingress, the pipeline and the query layer never couple to a
/// specific service.
///
/// Writes are atomic from the caller's view: an object is either absent or
/// complete, never partially visible to `get` or `list`.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Store `content` under `key` and return the object's public URL.
    ///
    /// With `overwrite = false` an existing key fails with
    /// [`StorageError::AlreadyExists`]. With `overwrite = true` the last
    /// completed write wins.
    async fn put(
        &self,
        location: Location,
        key: &str,
        content: ByteStream,
        overwrite: bool,
    ) -> StorageResult<String>;

    /// Open an object for reading.
    async fn get(&self, location: Location, key: &str) -> StorageResult<ByteStream>;

    /// List objects whose key starts with `prefix` (empty prefix lists all).
    ///
    /// Errors, including an invalid prefix, are yielded by the stream.
    fn list(&self, location: Location, prefix: &str) -> ObjectListing;

    /// Public URL for a key. Pure; does not check existence.
    fn build_url(&self, location: Location, key: &str) -> String;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;

    /// Convenience wrapper over [`Storage::put`] for in-memory content.
    async fn put_bytes(
        &self,
        location: Location,
        key: &str,
        data: Bytes,
        overwrite: bool,
    ) -> StorageResult<String> {
        self.put(location, key, bytes_stream(data), overwrite).await
    }

    /// Convenience wrapper over [`Storage::get`] that buffers the whole object.
    async fn get_bytes(&self, location: Location, key: &str) -> StorageResult<Bytes> {
        let stream = self.get(location, key).await?;
        collect_stream(stream).await
    }
}

/// Wrap a buffer as a single-chunk [`ByteStream`].
pub fn bytes_stream(data: Bytes) -> ByteStream {
    Box::pin(futures::stream::once(async move { Ok(data) }))
}

/// Drain a [`ByteStream`] into one buffer.
pub async fn collect_stream(mut stream: ByteStream) -> StorageResult<Bytes> {
    let mut buffer = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        buffer.extend_from_slice(&chunk?);
    }
    Ok(buffer.freeze())
}
