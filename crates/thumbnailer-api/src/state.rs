//! Application state shared by every handler.

use std::sync::Arc;
use thumbnailer_core::Config;
use thumbnailer_processing::MediaValidator;
use thumbnailer_storage::Storage;
use thumbnailer_worker::{DerivativePipeline, TriggerQueue};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub storage: Arc<dyn Storage>,
    pub validator: MediaValidator,
    /// Runs `handle(event)` for events posted to the intake endpoint.
    pub pipeline: Arc<DerivativePipeline>,
    /// Present when this process delivers creation events itself, i.e. the
    /// storage backend has no eventing of its own.
    pub trigger_queue: Option<TriggerQueue>,
}
