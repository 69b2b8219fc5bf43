//! Naming policy shared by ingress, the pipeline and every backend.
//!
//! Source keys are `{upload-token}-{filename}` where the token is a fresh
//! UUID v4. Derived keys are a pure function of the source key: the final
//! path segment with the upload token stripped, so a thumbnail is named after
//! the client's filename. Two uploads of the same filename therefore share one
//! thumbnail key and the later thumbnail replaces the earlier one.

use crate::{StorageError, StorageResult};
use thumbnailer_core::constants::MAX_KEY_LEN;
use uuid::Uuid;

/// Length of a hyphenated UUID.
const TOKEN_LEN: usize = 36;

/// Source key for a new upload. Each call draws a fresh token, so two uploads
/// of the same filename never collide in the source location.
pub fn derive_source_key(client_filename: &str) -> String {
    source_key_with_token(Uuid::new_v4(), client_filename)
}

/// Deterministic core of [`derive_source_key`].
pub fn source_key_with_token(token: Uuid, client_filename: &str) -> String {
    format!("{}-{}", token.hyphenated(), client_filename)
}

/// Derived (thumbnail) key for a source key.
///
/// Total and deterministic: the same source key always maps to the same
/// derived key, across processes and restarts.
pub fn derive_derived_key(source_key: &str) -> String {
    let name = source_key.rsplit('/').next().unwrap_or(source_key);
    strip_upload_token(name).unwrap_or(name).to_string()
}

/// Remainder of `name` after a leading `{uuid}-`, if it has one and something
/// follows it.
fn strip_upload_token(name: &str) -> Option<&str> {
    let token = name.get(..TOKEN_LEN)?;
    let rest = name.get(TOKEN_LEN..)?.strip_prefix('-')?;
    if rest.is_empty() || Uuid::parse_str(token).is_err() {
        return None;
    }
    Some(rest)
}

/// Reject keys no backend may store.
pub fn ensure_key_safe(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("key is empty".to_string()));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(StorageError::InvalidKey(format!(
            "key exceeds {} bytes",
            MAX_KEY_LEN
        )));
    }
    if key.starts_with('/') || key.contains("..") || key.contains('\\') {
        return Err(StorageError::InvalidKey(
            "Storage key contains invalid characters".to_string(),
        ));
    }
    if key.chars().any(|c| c.is_control()) {
        return Err(StorageError::InvalidKey(
            "Storage key contains control characters".to_string(),
        ));
    }
    Ok(())
}
