//! API route constants

/// Prefix shared by the JSON endpoints.
pub const API_PREFIX: &str = "/api";

/// Multipart field carrying the uploaded image.
pub const UPLOAD_FIELD: &str = "file";

/// Slack on top of the largest accepted file for multipart framing.
pub const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;
