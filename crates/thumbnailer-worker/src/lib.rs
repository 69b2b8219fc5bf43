//! Thumbnailer Worker Library
//!
//! The derivative pipeline (`handle(event)`: fetch, transform, publish) and
//! the in-process trigger queue that delivers creation events to it when the
//! storage backend has no eventing of its own.

pub mod context;
pub mod pipeline;
pub mod queue;

pub use context::EventHandler;
pub use pipeline::{
    DerivativePipeline, FailureReason, PipelineConfig, PipelineError, PipelineOutcome,
    PipelineState,
};
pub use queue::{DeliveryStatus, EventReport, EventReportSender, TriggerQueue, TriggerQueueConfig};
