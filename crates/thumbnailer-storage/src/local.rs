use crate::keys::ensure_key_safe;
use crate::traits::{ByteStream, ObjectListing, Storage, StorageError, StorageResult};
use crate::{Location, ObjectDescriptor, StorageBackend};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::collections::VecDeque;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

const STAGING_DIR: &str = ".staging";

/// Local filesystem storage implementation
///
/// Objects live at `{base_path}/{container}/{key}`. Writes are streamed into a
/// staging file under `{base_path}/.staging/`, synced, and only then moved into
/// place, so readers and listings never observe a partial object.
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
    source_container: String,
    derived_container: String,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for file storage (e.g., "/var/lib/thumbnailer")
    /// * `base_url` - Base URL files are served from (e.g., "http://localhost:7071/files")
    /// * `source_container` / `derived_container` - Directory names for the two locations
    pub async fn new(
        base_path: impl Into<PathBuf>,
        base_url: String,
        source_container: impl Into<String>,
        derived_container: impl Into<String>,
    ) -> StorageResult<Self> {
        let storage = LocalStorage {
            base_path: base_path.into(),
            base_url,
            source_container: source_container.into(),
            derived_container: derived_container.into(),
        };

        for dir in [
            storage.staging_dir(),
            storage.container_dir(Location::Source),
            storage.container_dir(Location::Derived),
        ] {
            fs::create_dir_all(&dir).await.map_err(|e| {
                StorageError::ConfigError(format!(
                    "Failed to create storage directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        Ok(storage)
    }

    fn container(&self, location: Location) -> &str {
        match location {
            Location::Source => &self.source_container,
            Location::Derived => &self.derived_container,
        }
    }

    fn container_dir(&self, location: Location) -> PathBuf {
        self.base_path.join(self.container(location))
    }

    fn staging_dir(&self) -> PathBuf {
        self.base_path.join(STAGING_DIR)
    }

    /// Convert storage key to filesystem path with security validation
    fn key_to_path(&self, location: Location, key: &str) -> StorageResult<PathBuf> {
        ensure_key_safe(key)?;
        Ok(self.container_dir(location).join(key))
    }

    /// Stream `content` into a fresh staging file and sync it to disk.
    async fn stage(&self, mut content: ByteStream) -> StorageResult<(PathBuf, u64)> {
        let staging_path = self.staging_dir().join(format!("{}.tmp", Uuid::new_v4()));
        let mut file = fs::File::create(&staging_path).await?;

        let mut written: u64 = 0;
        let result: StorageResult<()> = async {
            while let Some(chunk) = content.next().await {
                let chunk = chunk?;
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            file.sync_all().await?;
            Ok(())
        }
        .await;

        drop(file);
        if let Err(e) = result {
            let _ = fs::remove_file(&staging_path).await;
            return Err(e);
        }
        Ok((staging_path, written))
    }

    /// Move a staged file to its final path.
    ///
    /// `rename` replaces atomically; `hard_link` fails atomically when the
    /// target exists, which gives create-only semantics without a separate
    /// existence check.
    async fn publish(&self, staged: &Path, path: &Path, key: &str, overwrite: bool) -> StorageResult<()> {
        if overwrite {
            return fs::rename(staged, path).await.map_err(StorageError::from);
        }

        let linked = fs::hard_link(staged, path).await;
        let _ = fs::remove_file(staged).await;
        match linked {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(StorageError::AlreadyExists(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn put(
        &self,
        location: Location,
        key: &str,
        content: ByteStream,
        overwrite: bool,
    ) -> StorageResult<String> {
        let path = self.key_to_path(location, key)?;
        let start = std::time::Instant::now();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let (staged, size) = self.stage(content).await?;
        if let Err(e) = self.publish(&staged, &path, key, overwrite).await {
            let _ = fs::remove_file(&staged).await;
            tracing::warn!(
                error = %e,
                location = %location,
                key = %key,
                "Local storage put failed"
            );
            return Err(e);
        }

        tracing::info!(
            path = %path.display(),
            location = %location,
            key = %key,
            size_bytes = size,
            overwrite,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage put successful"
        );

        Ok(self.build_url(location, key))
    }

    async fn get(&self, location: Location, key: &str) -> StorageResult<ByteStream> {
        let path = self.key_to_path(location, key)?;

        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(path = %path.display(), key = %key, "Local storage get opened");

        let stream = tokio_util::io::ReaderStream::new(file)
            .map(|result| result.map_err(StorageError::from));
        Ok(Box::pin(stream))
    }

    fn list(&self, location: Location, prefix: &str) -> ObjectListing {
        let walk = Walk {
            storage: self.clone(),
            location,
            root: self.container_dir(location),
            prefix: prefix.to_string(),
            stack: Vec::new(),
            started: false,
        };
        Box::pin(futures::stream::try_unfold(walk, |mut walk| async move {
            let next = walk.next_object().await?;
            Ok(next.map(|descriptor| (descriptor, walk)))
        }))
    }

    fn build_url(&self, location: Location, key: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.container(location),
            key
        )
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

/// Depth-first directory walk yielding files in lexical key order.
///
/// One directory is read at a time, so a listing over a large container only
/// holds the entries of the directories on the current path.
struct Walk {
    storage: LocalStorage,
    location: Location,
    root: PathBuf,
    prefix: String,
    stack: Vec<VecDeque<(String, PathBuf)>>,
    started: bool,
}

impl Walk {
    async fn next_object(&mut self) -> StorageResult<Option<ObjectDescriptor>> {
        if !self.started {
            self.started = true;
            if self.prefix.starts_with('/') || self.prefix.contains("..") {
                return Err(StorageError::InvalidKey(format!(
                    "invalid list prefix: {}",
                    self.prefix
                )));
            }
            let root = self.root.clone();
            match self.read_level(&root, "").await {
                Ok(level) => self.stack.push(level),
                Err(StorageError::Io(e)) if e.kind() == ErrorKind::NotFound => return Ok(None),
                Err(e) => return Err(e),
            }
        }

        loop {
            let Some(level) = self.stack.last_mut() else {
                return Ok(None);
            };
            let Some((key, path)) = level.pop_front() else {
                self.stack.pop();
                continue;
            };

            let metadata = match fs::metadata(&path).await {
                Ok(metadata) => metadata,
                // Removed between readdir and stat.
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            if metadata.is_dir() {
                let dir_prefix = format!("{}/", key);
                if dir_prefix.starts_with(&self.prefix) || self.prefix.starts_with(&dir_prefix) {
                    let level = self.read_level(&path, &dir_prefix).await?;
                    self.stack.push(level);
                }
                continue;
            }

            if !metadata.is_file() || !key.starts_with(&self.prefix) {
                continue;
            }

            let last_modified = metadata.modified().ok().map(DateTime::<Utc>::from);
            return Ok(Some(ObjectDescriptor {
                url: self.storage.build_url(self.location, &key),
                key,
                size_bytes: Some(metadata.len()),
                last_modified,
            }));
        }
    }

    async fn read_level(
        &self,
        dir: &Path,
        key_prefix: &str,
    ) -> StorageResult<VecDeque<(String, PathBuf)>> {
        let mut entries = Vec::new();
        let mut read_dir = fs::read_dir(dir).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            entries.push((format!("{}{}", key_prefix, name), entry.path()));
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries.into())
    }
}
