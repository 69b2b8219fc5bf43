//! Configuration module
//!
//! This module provides configuration structures for the API, the trigger
//! queue and the storage gateway. Everything is read from the environment once
//! (after loading an optional `.env` file) and then passed explicitly to
//! constructors; no component looks configuration up on its own.

use std::env;
use std::fmt;
use std::str::FromStr;

use crate::constants::{DERIVED_CONTAINER, SOURCE_CONTAINER, THUMBNAIL_MAX_EDGE};
use crate::storage_types::{Location, StorageBackend, TriggerMode};

// Common constants
const SERVER_PORT: u16 = 7071;
const MAX_FILE_SIZE_MB: usize = 50;
const MAX_SOURCE_SIZE_MB: usize = 100;
const TRIGGER_MAX_WORKERS: usize = 4;
const TRIGGER_MAX_DELIVERIES: u32 = 5;
const TRIGGER_TIMEOUT_SECS: u64 = 300;
const TRIGGER_REDELIVERY_BASE_MS: u64 = 500;
const TRIGGER_CHANNEL_CAPACITY: usize = 1024;
const LOCAL_BASE_URL: &str = "http://localhost:7071/files";

/// Storage gateway configuration
#[derive(Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Single credential for the storage account (Azure connection string).
    pub connection_string: Option<String>,
    /// Overrides the backend's default public URL prefix.
    pub public_base_url: Option<String>,
    pub local_storage_path: Option<String>,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    /// Custom endpoint for S3-compatible providers (MinIO, etc.)
    pub s3_endpoint: Option<String>,
    pub source_container: String,
    pub derived_container: String,
}

impl StorageConfig {
    /// Configuration for a backend with default containers and nothing else set.
    pub fn new(backend: StorageBackend) -> Self {
        Self {
            backend,
            connection_string: None,
            public_base_url: None,
            local_storage_path: None,
            s3_bucket: None,
            s3_region: None,
            s3_endpoint: None,
            source_container: SOURCE_CONTAINER.to_string(),
            derived_container: DERIVED_CONTAINER.to_string(),
        }
    }

    /// Container name backing a logical location.
    pub fn container(&self, location: Location) -> &str {
        match location {
            Location::Source => &self.source_container,
            Location::Derived => &self.derived_container,
        }
    }

    /// Check that the selected backend has what it needs.
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.source_container == self.derived_container {
            anyhow::bail!("Source and derived containers must differ");
        }
        match self.backend {
            StorageBackend::Azure => {
                let conn = self.connection_string.as_deref().ok_or_else(|| {
                    anyhow::anyhow!(
                        "STORAGE_CONNECTION_STRING (or AzureWebJobsStorage) must be set for the azure backend"
                    )
                })?;
                AzureConnectionString::parse(conn)?;
            }
            StorageBackend::S3 => {
                if self.s3_bucket.is_none() {
                    anyhow::bail!("S3_BUCKET must be set for the s3 backend");
                }
                if self.s3_region.is_none() {
                    anyhow::bail!("S3_REGION or AWS_REGION must be set for the s3 backend");
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    anyhow::bail!("LOCAL_STORAGE_PATH must be set for the local backend");
                }
            }
            StorageBackend::Memory => {}
        }
        Ok(())
    }
}

// Hand-written so the account key never reaches a log line.
impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("backend", &self.backend)
            .field(
                "connection_string",
                &self.connection_string.as_ref().map(|_| "<redacted>"),
            )
            .field("public_base_url", &self.public_base_url)
            .field("local_storage_path", &self.local_storage_path)
            .field("s3_bucket", &self.s3_bucket)
            .field("s3_region", &self.s3_region)
            .field("s3_endpoint", &self.s3_endpoint)
            .field("source_container", &self.source_container)
            .field("derived_container", &self.derived_container)
            .finish()
    }
}

/// Ingress validation limits
#[derive(Clone, Debug)]
pub struct UploadConfig {
    pub max_file_size_bytes: usize,
    pub allowed_extensions: Vec<String>,
    pub allowed_content_types: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: MAX_FILE_SIZE_MB * 1024 * 1024,
            allowed_extensions: split_list("jpg,jpeg,png,gif,webp"),
            allowed_content_types: split_list("image/jpeg,image/png,image/gif,image/webp"),
        }
    }
}

/// Trigger delivery configuration
#[derive(Clone, Debug)]
pub struct TriggerConfig {
    pub mode: TriggerMode,
    pub max_workers: usize,
    /// Total deliveries per event, the first one included.
    pub max_deliveries: u32,
    /// Deadline for a single pipeline invocation.
    pub timeout_seconds: u64,
    pub redelivery_base_ms: u64,
    pub channel_capacity: usize,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            mode: TriggerMode::InProcess,
            max_workers: TRIGGER_MAX_WORKERS,
            max_deliveries: TRIGGER_MAX_DELIVERIES,
            timeout_seconds: TRIGGER_TIMEOUT_SECS,
            redelivery_base_ms: TRIGGER_REDELIVERY_BASE_MS,
            channel_capacity: TRIGGER_CHANNEL_CAPACITY,
        }
    }
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub server_port: u16,
    pub environment: String,
    /// `json` switches the log output to JSON lines.
    pub log_format: String,
    pub storage: StorageConfig,
    pub upload: UploadConfig,
    pub trigger: TriggerConfig,
    pub thumbnail_max_edge: u32,
    pub max_source_size_bytes: usize,
}

impl Config {
    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    /// Load configuration from environment variables (and `.env`, if present).
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let server_port = env::var("PORT")
            .unwrap_or_else(|_| SERVER_PORT.to_string())
            .parse()
            .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?;

        let backend = match env::var("STORAGE_BACKEND") {
            Ok(value) => value.parse::<StorageBackend>()?,
            Err(_) => StorageBackend::Local,
        };

        let mut storage = StorageConfig::new(backend);
        storage.connection_string = env::var("STORAGE_CONNECTION_STRING")
            .or_else(|_| env::var("AzureWebJobsStorage"))
            .ok();
        storage.public_base_url = env::var("PUBLIC_BASE_URL").ok();
        storage.local_storage_path = env::var("LOCAL_STORAGE_PATH")
            .ok()
            .or_else(|| (backend == StorageBackend::Local).then(|| "./data".to_string()));
        storage.s3_bucket = env::var("S3_BUCKET").ok();
        storage.s3_region = env::var("S3_REGION")
            .or_else(|_| env::var("AWS_REGION"))
            .ok();
        storage.s3_endpoint = env::var("S3_ENDPOINT").ok();
        if backend == StorageBackend::Local && storage.public_base_url.is_none() {
            storage.public_base_url = Some(LOCAL_BASE_URL.to_string());
        }

        let upload_defaults = UploadConfig::default();
        let upload = UploadConfig {
            max_file_size_bytes: env_or("MAX_FILE_SIZE_MB", MAX_FILE_SIZE_MB) * 1024 * 1024,
            allowed_extensions: env::var("ALLOWED_EXTENSIONS")
                .map(|s| split_list(&s))
                .unwrap_or(upload_defaults.allowed_extensions),
            allowed_content_types: env::var("ALLOWED_CONTENT_TYPES")
                .map(|s| split_list(&s))
                .unwrap_or(upload_defaults.allowed_content_types),
        };

        let trigger_mode = match env::var("TRIGGER_MODE") {
            Ok(value) => value.parse::<TriggerMode>()?,
            Err(_) if backend.has_native_events() => TriggerMode::External,
            Err(_) => TriggerMode::InProcess,
        };

        let trigger = TriggerConfig {
            mode: trigger_mode,
            max_workers: env_or("TRIGGER_MAX_WORKERS", TRIGGER_MAX_WORKERS).max(1),
            max_deliveries: env_or("TRIGGER_MAX_DELIVERIES", TRIGGER_MAX_DELIVERIES).max(1),
            timeout_seconds: env_or("TRIGGER_TIMEOUT_SECONDS", TRIGGER_TIMEOUT_SECS),
            redelivery_base_ms: env_or("TRIGGER_REDELIVERY_BASE_MS", TRIGGER_REDELIVERY_BASE_MS),
            channel_capacity: env_or("TRIGGER_CHANNEL_CAPACITY", TRIGGER_CHANNEL_CAPACITY).max(1),
        };

        Ok(Config {
            server_port,
            environment,
            log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "compact".to_string()),
            storage,
            upload,
            trigger,
            thumbnail_max_edge: THUMBNAIL_MAX_EDGE,
            max_source_size_bytes: env_or("MAX_SOURCE_SIZE_MB", MAX_SOURCE_SIZE_MB) * 1024 * 1024,
        })
    }

    /// Validate the loaded configuration; fail fast on misconfiguration.
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.storage.validate()?;
        if self.upload.allowed_extensions.is_empty() {
            anyhow::bail!("ALLOWED_EXTENSIONS must list at least one extension");
        }
        if self.trigger.timeout_seconds == 0 {
            anyhow::bail!("TRIGGER_TIMEOUT_SECONDS must be greater than zero");
        }
        Ok(())
    }
}

/// Read a variable, falling back to `default` when unset or unparsable.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parsed Azure storage connection string.
///
/// Understands `AccountName`, `AccountKey`, `BlobEndpoint`,
/// `DefaultEndpointsProtocol`, `EndpointSuffix` and the
/// `UseDevelopmentStorage=true` shortcut.
#[derive(Clone, PartialEq, Eq)]
pub struct AzureConnectionString {
    pub account_name: String,
    pub account_key: Option<String>,
    pub blob_endpoint: Option<String>,
    pub use_emulator: bool,
}

impl AzureConnectionString {
    pub fn parse(raw: &str) -> Result<Self, anyhow::Error> {
        let mut account_name = None;
        let mut account_key = None;
        let mut blob_endpoint = None;
        let mut protocol = "https".to_string();
        let mut suffix = "core.windows.net".to_string();
        let mut use_emulator = false;

        for part in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, value) = part
                .split_once('=')
                .ok_or_else(|| anyhow::anyhow!("Malformed connection string segment"))?;
            match name {
                "AccountName" => account_name = Some(value.to_string()),
                "AccountKey" => account_key = Some(value.to_string()),
                "BlobEndpoint" => blob_endpoint = Some(value.trim_end_matches('/').to_string()),
                "DefaultEndpointsProtocol" => protocol = value.to_string(),
                "EndpointSuffix" => suffix = value.to_string(),
                "UseDevelopmentStorage" => use_emulator = value.eq_ignore_ascii_case("true"),
                _ => {}
            }
        }

        if use_emulator {
            return Ok(Self {
                account_name: "devstoreaccount1".to_string(),
                account_key: None,
                blob_endpoint: Some("http://127.0.0.1:10000/devstoreaccount1".to_string()),
                use_emulator: true,
            });
        }

        let account_name =
            account_name.ok_or_else(|| anyhow::anyhow!("Connection string is missing AccountName"))?;
        let blob_endpoint = blob_endpoint
            .unwrap_or_else(|| format!("{}://{}.blob.{}", protocol, account_name, suffix));

        Ok(Self {
            account_name,
            account_key,
            blob_endpoint: Some(blob_endpoint),
            use_emulator: false,
        })
    }

    /// Base URL objects are publicly served from (without container).
    pub fn public_base_url(&self) -> String {
        self.blob_endpoint
            .clone()
            .unwrap_or_else(|| format!("https://{}.blob.core.windows.net", self.account_name))
    }
}

impl fmt::Debug for AzureConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureConnectionString")
            .field("account_name", &self.account_name)
            .field("account_key", &self.account_key.as_ref().map(|_| "<redacted>"))
            .field("blob_endpoint", &self.blob_endpoint)
            .field("use_emulator", &self.use_emulator)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_account_connection_string() {
        let conn = AzureConnectionString::parse(
            "DefaultEndpointsProtocol=https;AccountName=imagetp;AccountKey=c2VjcmV0;EndpointSuffix=core.windows.net",
        )
        .unwrap();
        assert_eq!(conn.account_name, "imagetp");
        assert_eq!(conn.account_key.as_deref(), Some("c2VjcmV0"));
        assert_eq!(
            conn.public_base_url(),
            "https://imagetp.blob.core.windows.net"
        );
        assert!(!conn.use_emulator);
    }

    #[test]
    fn test_parse_development_storage() {
        let conn = AzureConnectionString::parse("UseDevelopmentStorage=true").unwrap();
        assert!(conn.use_emulator);
        assert_eq!(conn.account_name, "devstoreaccount1");
    }

    #[test]
    fn test_parse_explicit_blob_endpoint() {
        let conn = AzureConnectionString::parse(
            "AccountName=acct;AccountKey=a2V5;BlobEndpoint=https://cdn.example.com/",
        )
        .unwrap();
        assert_eq!(conn.public_base_url(), "https://cdn.example.com");
    }

    #[test]
    fn test_parse_rejects_missing_account() {
        assert!(AzureConnectionString::parse("AccountKey=a2V5").is_err());
        assert!(AzureConnectionString::parse("AccountName").is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut storage = StorageConfig::new(StorageBackend::Azure);
        storage.connection_string = Some("AccountName=a;AccountKey=topsecret".to_string());
        let rendered = format!("{:?}", storage);
        assert!(!rendered.contains("topsecret"));

        let conn = AzureConnectionString::parse("AccountName=a;AccountKey=topsecret").unwrap();
        assert!(!format!("{:?}", conn).contains("topsecret"));
    }

    #[test]
    fn test_storage_validation() {
        assert!(StorageConfig::new(StorageBackend::Memory).validate().is_ok());
        assert!(StorageConfig::new(StorageBackend::Azure).validate().is_err());
        assert!(StorageConfig::new(StorageBackend::S3).validate().is_err());
        assert!(StorageConfig::new(StorageBackend::Local).validate().is_err());

        let mut s3 = StorageConfig::new(StorageBackend::S3);
        s3.s3_bucket = Some("bucket".to_string());
        s3.s3_region = Some("eu-west-1".to_string());
        assert!(s3.validate().is_ok());

        let mut same = StorageConfig::new(StorageBackend::Memory);
        same.derived_container = same.source_container.clone();
        assert!(same.validate().is_err());
    }

    #[test]
    fn test_container_for_location() {
        let storage = StorageConfig::new(StorageBackend::Memory);
        assert_eq!(storage.container(Location::Source), "images");
        assert_eq!(storage.container(Location::Derived), "thumbnails");
    }

    #[test]
    fn test_split_list_normalizes() {
        assert_eq!(split_list(" PNG, jpg ,,"), vec!["png", "jpg"]);
    }
}
