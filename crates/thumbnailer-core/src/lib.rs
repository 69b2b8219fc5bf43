//! Thumbnailer Core Library
//!
//! This crate provides the configuration, error taxonomy, constants and shared
//! models used by every Thumbnailer component.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{AzureConnectionString, Config, StorageConfig, TriggerConfig, UploadConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{ObjectDescriptor, ThumbnailEntry, TriggerEvent};
pub use storage_types::{Location, StorageBackend, TriggerMode};
