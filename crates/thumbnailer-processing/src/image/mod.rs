//! Image processing module
//!
//! This module provides the thumbnail transform:
//! - Format detection and the set of supported formats
//! - Bounded resize math and filter selection (resize)
//! - Decode, resize and re-encode (transformer)

pub mod resize;
pub mod transformer;

pub use resize::ImageResize;
pub use transformer::ImageTransformer;

use serde::Serialize;
use std::fmt;

/// Transform failures. None of them succeed on retry with the same input.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    /// No codec for this format, or the codec cannot handle this variant of it.
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// The bytes claim a supported format but do not decode.
    #[error("Corrupt image data: {0}")]
    Corrupt(String),
}

/// Formats the transform reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ThumbnailFormat {
    Jpeg,
    Png,
    Gif,
    WebP,
}

impl ThumbnailFormat {
    pub fn from_image_format(format: ::image::ImageFormat) -> Option<Self> {
        match format {
            ::image::ImageFormat::Jpeg => Some(ThumbnailFormat::Jpeg),
            ::image::ImageFormat::Png => Some(ThumbnailFormat::Png),
            ::image::ImageFormat::Gif => Some(ThumbnailFormat::Gif),
            ::image::ImageFormat::WebP => Some(ThumbnailFormat::WebP),
            _ => None,
        }
    }

    pub fn image_format(&self) -> ::image::ImageFormat {
        match self {
            ThumbnailFormat::Jpeg => ::image::ImageFormat::Jpeg,
            ThumbnailFormat::Png => ::image::ImageFormat::Png,
            ThumbnailFormat::Gif => ::image::ImageFormat::Gif,
            ThumbnailFormat::WebP => ::image::ImageFormat::WebP,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ThumbnailFormat::Jpeg => "image/jpeg",
            ThumbnailFormat::Png => "image/png",
            ThumbnailFormat::Gif => "image/gif",
            ThumbnailFormat::WebP => "image/webp",
        }
    }
}

impl fmt::Display for ThumbnailFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThumbnailFormat::Jpeg => write!(f, "jpeg"),
            ThumbnailFormat::Png => write!(f, "png"),
            ThumbnailFormat::Gif => write!(f, "gif"),
            ThumbnailFormat::WebP => write!(f, "webp"),
        }
    }
}
