//! Storage doubles for failure scenarios.

use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Mutex;
use thumbnailer_core::{Location, StorageBackend};
use thumbnailer_storage::{
    ByteStream, ObjectListing, ObjectStoreStorage, Storage, StorageError, StorageResult,
};

/// In-memory storage whose reads always fail as if the service were down.
pub struct UnavailableStorage {
    pub inner: ObjectStoreStorage,
}

impl UnavailableStorage {
    pub fn new() -> Self {
        Self {
            inner: ObjectStoreStorage::in_memory("images", "thumbnails", None),
        }
    }
}

#[async_trait]
impl Storage for UnavailableStorage {
    async fn put(
        &self,
        location: Location,
        key: &str,
        content: ByteStream,
        overwrite: bool,
    ) -> StorageResult<String> {
        self.inner.put(location, key, content, overwrite).await
    }

    async fn get(&self, _location: Location, key: &str) -> StorageResult<ByteStream> {
        Err(StorageError::Transient(format!(
            "service unavailable reading {}",
            key
        )))
    }

    fn list(&self, location: Location, prefix: &str) -> ObjectListing {
        self.inner.list(location, prefix)
    }

    fn build_url(&self, location: Location, key: &str) -> String {
        self.inner.build_url(location, key)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}

/// In-memory storage that records every put and can fail writes or break a
/// listing after its first entry.
pub struct FaultyStorage {
    pub inner: ObjectStoreStorage,
    pub fail_puts: bool,
    pub fail_list_midway: bool,
    puts: Mutex<Vec<(Location, String, bool)>>,
}

impl FaultyStorage {
    pub fn new() -> Self {
        Self {
            inner: ObjectStoreStorage::in_memory("images", "thumbnails", None),
            fail_puts: false,
            fail_list_midway: false,
            puts: Mutex::new(Vec::new()),
        }
    }

    /// `(location, key, overwrite)` for every put attempted so far.
    pub fn puts(&self) -> Vec<(Location, String, bool)> {
        self.puts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Storage for FaultyStorage {
    async fn put(
        &self,
        location: Location,
        key: &str,
        content: ByteStream,
        overwrite: bool,
    ) -> StorageResult<String> {
        self.puts
            .lock()
            .unwrap()
            .push((location, key.to_string(), overwrite));
        if self.fail_puts {
            return Err(StorageError::Transient(format!(
                "service unavailable writing {}",
                key
            )));
        }
        self.inner.put(location, key, content, overwrite).await
    }

    async fn get(&self, location: Location, key: &str) -> StorageResult<ByteStream> {
        self.inner.get(location, key).await
    }

    fn list(&self, location: Location, prefix: &str) -> ObjectListing {
        let listing = self.inner.list(location, prefix);
        if !self.fail_list_midway {
            return listing;
        }
        let broken = listing.take(1).chain(futures::stream::once(async {
            Err(StorageError::Transient("listing interrupted".to_string()))
        }));
        Box::pin(broken)
    }

    fn build_url(&self, location: Location, key: &str) -> String {
        self.inner.build_url(location, key)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}
