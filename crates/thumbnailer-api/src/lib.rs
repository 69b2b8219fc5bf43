//! Thumbnailer API Library
//!
//! This crate provides the HTTP ingress (upload), the thumbnail query endpoint,
//! trigger intake for platform-delivered events, and application setup.

mod api_doc;
pub mod constants;
mod handlers;
pub mod setup;
mod telemetry;

pub mod error;
pub mod state;

pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
