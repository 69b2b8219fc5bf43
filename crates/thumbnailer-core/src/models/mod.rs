//! Shared data models.

pub mod event;
pub mod object;

pub use event::TriggerEvent;
pub use object::{ObjectDescriptor, ThumbnailEntry};
