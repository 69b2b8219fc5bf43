use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Storage backend types
///
/// This enum defines the available storage backend types.
/// It's defined in core because it's used in configuration and by every gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Azure,
    S3,
    Local,
    Memory,
}

impl StorageBackend {
    /// Whether the backend's platform emits creation notifications on its own.
    ///
    /// Local and in-memory stores have no eventing, so uploads must be
    /// announced to the pipeline by the process that wrote them.
    pub fn has_native_events(&self) -> bool {
        matches!(self, StorageBackend::Azure | StorageBackend::S3)
    }
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "azure" | "blob" => Ok(StorageBackend::Azure),
            "s3" => Ok(StorageBackend::S3),
            "local" => Ok(StorageBackend::Local),
            "memory" => Ok(StorageBackend::Memory),
            _ => Err(anyhow::anyhow!("Invalid storage backend: {}", s)),
        }
    }
}

impl Display for StorageBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            StorageBackend::Azure => write!(f, "azure"),
            StorageBackend::S3 => write!(f, "s3"),
            StorageBackend::Local => write!(f, "local"),
            StorageBackend::Memory => write!(f, "memory"),
        }
    }
}

/// One of the two logical storage areas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    /// Raw uploads.
    Source,
    /// Generated thumbnails.
    Derived,
}

impl Display for Location {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Location::Source => write!(f, "source"),
            Location::Derived => write!(f, "derived"),
        }
    }
}

/// How creation events reach the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerMode {
    /// The API publishes an event to the in-process trigger queue after each upload.
    InProcess,
    /// An outside platform delivers events to `POST /api/events`.
    External,
}

impl FromStr for TriggerMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "in-process" | "inprocess" | "local" => Ok(TriggerMode::InProcess),
            "external" | "platform" => Ok(TriggerMode::External),
            _ => Err(anyhow::anyhow!("Invalid trigger mode: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_backend_round_trips_through_display() {
        for backend in [
            StorageBackend::Azure,
            StorageBackend::S3,
            StorageBackend::Local,
            StorageBackend::Memory,
        ] {
            let parsed: StorageBackend = backend.to_string().parse().unwrap();
            assert_eq!(parsed, backend);
        }
    }

    #[test]
    fn test_storage_backend_rejects_unknown() {
        assert!("nfs".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn test_native_events() {
        assert!(StorageBackend::Azure.has_native_events());
        assert!(!StorageBackend::Local.has_native_events());
        assert!(!StorageBackend::Memory.has_native_events());
    }

    #[test]
    fn test_trigger_mode_aliases() {
        assert_eq!(
            "in_process".parse::<TriggerMode>().unwrap(),
            TriggerMode::InProcess
        );
        assert_eq!(
            "External".parse::<TriggerMode>().unwrap(),
            TriggerMode::External
        );
        assert!("sometimes".parse::<TriggerMode>().is_err());
    }
}
