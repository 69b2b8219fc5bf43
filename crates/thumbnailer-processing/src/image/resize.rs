//! Bounded resize math and filter selection.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};

pub struct ImageResize;

impl ImageResize {
    /// Target size that fits `width` x `height` inside a `max_edge` square.
    ///
    /// The long edge becomes exactly `max_edge`, the short edge is scaled by
    /// the same factor and rounded (never below 1). Images already inside the
    /// bound keep their size; nothing is upscaled.
    pub fn bounded_dimensions(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
        if max_edge == 0 || (width <= max_edge && height <= max_edge) {
            return (width, height);
        }

        let scale = |short: u32, long: u32| -> u32 {
            let scaled = (short as u64 * max_edge as u64 + long as u64 / 2) / long as u64;
            (scaled as u32).clamp(1, max_edge)
        };

        if width >= height {
            (max_edge, scale(height, width))
        } else {
            (scale(width, height), max_edge)
        }
    }

    /// Resampling filter for a given downscale.
    ///
    /// Large reductions use cheaper filters; the detail they lose is below
    /// what the target resolution can show anyway.
    pub fn select_filter(source_long_edge: u32, target_long_edge: u32) -> FilterType {
        let ratio = source_long_edge as f32 / target_long_edge.max(1) as f32;
        if ratio > 2.0 {
            FilterType::Triangle
        } else if ratio > 1.5 {
            FilterType::CatmullRom
        } else {
            FilterType::Lanczos3
        }
    }

    /// Resize to fit inside `max_edge`, or `None` when already in bounds.
    pub fn fit(img: &DynamicImage, max_edge: u32) -> Option<DynamicImage> {
        let (width, height) = img.dimensions();
        let (target_width, target_height) = Self::bounded_dimensions(width, height, max_edge);
        if (target_width, target_height) == (width, height) {
            return None;
        }

        let filter = Self::select_filter(width.max(height), target_width.max(target_height));
        tracing::debug!(
            width,
            height,
            target_width,
            target_height,
            filter = ?filter,
            "Resizing image"
        );
        Some(img.resize_exact(target_width, target_height, filter))
    }
}
