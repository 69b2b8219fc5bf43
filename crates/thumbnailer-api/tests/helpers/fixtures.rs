//! Test fixtures: encoded images.

use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

/// Solid-colour image encoded as `format`.
pub fn create_test_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 90]));
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), format)
        .expect("Failed to encode test image");
    buffer
}

pub fn create_test_png(width: u32, height: u32) -> Vec<u8> {
    create_test_image(width, height, ImageFormat::Png)
}

/// Decoded dimensions and sniffed format of an encoded image.
pub fn inspect(data: &[u8]) -> ((u32, u32), ImageFormat) {
    let format = image::guess_format(data).expect("Unrecognized image data");
    let img = image::load_from_memory(data).expect("Failed to decode image");
    ((img.width(), img.height()), format)
}
