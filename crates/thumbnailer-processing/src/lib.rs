//! Thumbnailer Processing Library
//!
//! Image transformation (decode, bounded resize, re-encode in the source
//! format) and ingress validation of uploaded files.

pub mod image;
pub mod validator;

pub use crate::image::{ImageTransformer, ThumbnailFormat, TransformError};
pub use validator::{MediaValidator, ValidationError};
