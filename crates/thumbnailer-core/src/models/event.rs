//! Source-object creation notifications.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A notification that an object was created in the source location.
///
/// Delivery is at-least-once: the same key may arrive several times, late,
/// or out of order. Nothing here is persisted by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TriggerEvent {
    /// Key of the source object, relative to the source container.
    #[serde(alias = "key", alias = "name")]
    pub source_key: String,

    /// 1-based delivery counter maintained by whoever delivers the event.
    #[serde(default = "first_delivery")]
    pub delivery_attempt: u32,

    /// Platform-assigned identifier, carried only for log correlation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
}

fn first_delivery() -> u32 {
    1
}

impl TriggerEvent {
    pub fn new(source_key: impl Into<String>) -> Self {
        Self {
            source_key: source_key.into(),
            delivery_attempt: first_delivery(),
            event_id: None,
        }
    }

    /// Build an event from a platform blob path.
    ///
    /// Accepts `"{container}/{name}"` (blob-trigger style) and
    /// `"/blobServices/default/containers/{container}/blobs/{name}"`
    /// (event-subject style). Returns `None` when the path points into a
    /// different container or names no object.
    pub fn from_blob_path(path: &str, source_container: &str) -> Option<Self> {
        let subject_marker = format!("/containers/{}/blobs/", source_container);
        let name = if let Some(idx) = path.find(&subject_marker) {
            &path[idx + subject_marker.len()..]
        } else {
            let trimmed = path.trim_start_matches('/');
            let (container, name) = trimmed.split_once('/')?;
            if container != source_container {
                return None;
            }
            name
        };

        if name.is_empty() {
            return None;
        }
        Some(Self::new(name))
    }

    /// The same event, as it looks on its next delivery.
    pub fn redelivered(&self) -> Self {
        Self {
            source_key: self.source_key.clone(),
            delivery_attempt: self.delivery_attempt.saturating_add(1),
            event_id: self.event_id.clone(),
        }
    }
}
