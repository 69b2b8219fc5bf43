//! Fixed names and limits shared across crates.

/// Container holding raw uploads.
pub const SOURCE_CONTAINER: &str = "images";

/// Container holding generated thumbnails.
pub const DERIVED_CONTAINER: &str = "thumbnails";

/// Longest edge, in pixels, of any generated thumbnail.
pub const THUMBNAIL_MAX_EDGE: u32 = 256;

/// Maximum length of a storage key in bytes.
pub const MAX_KEY_LEN: usize = 1024;
