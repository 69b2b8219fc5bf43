//! Stored object descriptors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One entry of a storage listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectDescriptor {
    /// Object key within its location.
    pub key: String,

    /// Public URL of the object.
    pub url: String,

    /// Size in bytes, when the backend reports it.
    pub size_bytes: Option<u64>,

    /// Last write time, when the backend reports it.
    pub last_modified: Option<DateTime<Utc>>,
}

/// A thumbnail as returned by the query endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ThumbnailEntry {
    pub name: String,
    pub url: String,
}

impl From<ObjectDescriptor> for ThumbnailEntry {
    fn from(descriptor: ObjectDescriptor) -> Self {
        Self {
            name: descriptor.key,
            url: descriptor.url,
        }
    }
}
