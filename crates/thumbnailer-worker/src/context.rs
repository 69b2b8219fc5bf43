//! Event handler trait
//!
//! The pipeline implements this trait. The trigger queue holds an
//! `Arc<dyn EventHandler>` and calls `handle_event` for every delivery, so
//! delivery and processing stay independent of each other.

use async_trait::async_trait;
use thumbnailer_core::TriggerEvent;

use crate::pipeline::{PipelineError, PipelineOutcome};

/// Something that processes one creation event per call.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle_event(&self, event: &TriggerEvent) -> Result<PipelineOutcome, PipelineError>;
}
