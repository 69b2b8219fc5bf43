//! Image transformer - produces a bounded-size copy of an image in its own format

use crate::image::resize::ImageResize;
use crate::image::{ThumbnailFormat, TransformError};
use bytes::Bytes;
use image::{GenericImageView, ImageError};
use std::io::Cursor;

/// Stateless thumbnail transform. Pure, synchronous and deterministic: the
/// same bytes, format and bound always produce the same output.
pub struct ImageTransformer;

impl ImageTransformer {
    /// Sniff the format from the leading magic bytes.
    pub fn detect_format(data: &[u8]) -> Result<ThumbnailFormat, TransformError> {
        let format = image::guess_format(data)
            .map_err(|_| TransformError::UnsupportedFormat("unrecognized image data".to_string()))?;
        ThumbnailFormat::from_image_format(format)
            .ok_or_else(|| TransformError::UnsupportedFormat(format!("{:?}", format)))
    }

    /// Decode `data` as `format`, shrink it to fit within `max_edge` on both
    /// axes and re-encode it in the same format.
    ///
    /// Images already within bounds are returned byte-for-byte, but only after
    /// they decode successfully.
    pub fn apply(
        data: &[u8],
        format: ThumbnailFormat,
        max_edge: u32,
    ) -> Result<Bytes, TransformError> {
        let img = image::load_from_memory_with_format(data, format.image_format())
            .map_err(decode_error)?;

        let Some(resized) = ImageResize::fit(&img, max_edge) else {
            return Ok(Bytes::copy_from_slice(data));
        };

        let (width, height) = resized.dimensions();
        let estimated_size = (width * height * 3) as usize;
        let mut buffer = Vec::with_capacity(estimated_size);
        let mut cursor = Cursor::new(&mut buffer);
        resized
            .write_to(&mut cursor, format.image_format())
            .map_err(|e| TransformError::UnsupportedFormat(format!("cannot encode {}: {}", format, e)))?;

        Ok(Bytes::from(buffer))
    }
}

fn decode_error(err: ImageError) -> TransformError {
    match err {
        ImageError::Unsupported(e) => TransformError::UnsupportedFormat(e.to_string()),
        other => TransformError::Corrupt(other.to_string()),
    }
}
