//! Thumbnailer Storage Library
//!
//! This crate provides the storage gateway used by ingress, the derivative
//! pipeline and the query endpoint. It includes the `Storage` trait, the key
//! naming policy and implementations for the local filesystem and for
//! `object_store` backends (Azure Blob, S3, in-memory).
//!
//! # Storage key format
//!
//! Keys are relative to a logical [`Location`]; each location maps to its own
//! container. Source keys are `{upload-token}-{filename}` and derived keys are
//! computed from source keys alone (see [`keys`]). Keys must not be empty,
//! contain `..`, a backslash or control characters, or start with `/`.

pub mod factory;
pub mod keys;
pub mod local;
pub mod object;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use keys::{derive_derived_key, derive_source_key, ensure_key_safe, source_key_with_token};
pub use local::LocalStorage;
pub use object::ObjectStoreStorage;
pub use thumbnailer_core::{Location, ObjectDescriptor, StorageBackend};
pub use traits::{
    bytes_stream, collect_stream, ByteStream, ObjectListing, Storage, StorageError, StorageResult,
};
