//! Derivative pipeline: turns a source-object creation event into a thumbnail.
//!
//! Every invocation walks `Received -> Fetching -> Transforming -> Publishing
//! -> Done`, or stops in `Failed` with a reason. There is no shared state
//! between invocations: the derived key is a pure function of the source key
//! and the final write is an atomic overwrite, so duplicate, late and
//! concurrent deliveries all converge on the same thumbnail.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

use thumbnailer_core::{Config, Location, TriggerEvent};
use thumbnailer_processing::{ImageTransformer, ThumbnailFormat, TransformError};
use thumbnailer_storage::{derive_derived_key, ensure_key_safe, Storage, StorageError};

use crate::context::EventHandler;

/// Pipeline states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Received,
    Fetching,
    Transforming,
    Publishing,
    Done,
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Received => "received",
            PipelineState::Fetching => "fetching",
            PipelineState::Transforming => "transforming",
            PipelineState::Publishing => "publishing",
            PipelineState::Done => "done",
            PipelineState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Why an invocation ended in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Source object absent, e.g. deleted before the event arrived.
    NotFound,
    /// Storage was temporarily unavailable.
    Transient,
    UnsupportedFormat,
    Corrupt,
    /// The event names a key no backend can hold.
    InvalidKey,
    /// Storage refused the request because of credentials, permissions or an
    /// unsupported operation. Redelivery cannot fix it.
    Misconfigured,
    /// The invocation was cancelled before it could finish.
    Internal,
}

impl FailureReason {
    /// Whether a later delivery of the same event can succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, FailureReason::Transient | FailureReason::Internal)
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureReason::NotFound => "not_found",
            FailureReason::Transient => "transient",
            FailureReason::UnsupportedFormat => "unsupported_format",
            FailureReason::Corrupt => "corrupt",
            FailureReason::InvalidKey => "invalid_key",
            FailureReason::Misconfigured => "misconfigured",
            FailureReason::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// A failed invocation: where it stopped and why.
#[derive(Debug, Error)]
#[error("{reason} failure while {state} {source_key}: {message}")]
pub struct PipelineError {
    pub source_key: String,
    /// State the invocation was in when it failed.
    pub state: PipelineState,
    pub reason: FailureReason,
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl PipelineError {
    pub fn new(
        source_key: impl Into<String>,
        state: PipelineState,
        reason: FailureReason,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source_key: source_key.into(),
            state,
            reason,
            message: message.into(),
            source: None,
        }
    }

    fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn is_recoverable(&self) -> bool {
        self.reason.is_recoverable()
    }
}

/// A completed invocation.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub source_key: String,
    pub derived_key: String,
    pub url: String,
    pub format: ThumbnailFormat,
    pub transitions: Vec<PipelineState>,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Bound on both thumbnail dimensions.
    pub max_edge: u32,
    /// Sources larger than this are never processed.
    pub max_source_bytes: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_edge: thumbnailer_core::constants::THUMBNAIL_MAX_EDGE,
            max_source_bytes: 100 * 1024 * 1024,
        }
    }
}

impl From<&Config> for PipelineConfig {
    fn from(config: &Config) -> Self {
        Self {
            max_edge: config.thumbnail_max_edge,
            max_source_bytes: config.max_source_size_bytes,
        }
    }
}

/// The derivative pipeline. Cheap to clone; holds no per-event state.
#[derive(Clone)]
pub struct DerivativePipeline {
    storage: Arc<dyn Storage>,
    config: PipelineConfig,
}

/// Transition log of one invocation.
struct Run<'a> {
    source_key: &'a str,
    transitions: Vec<PipelineState>,
}

impl<'a> Run<'a> {
    fn new(source_key: &'a str) -> Self {
        Self {
            source_key,
            transitions: Vec::with_capacity(5),
        }
    }

    fn state(&self) -> PipelineState {
        self.transitions
            .last()
            .copied()
            .unwrap_or(PipelineState::Received)
    }

    fn enter(&mut self, state: PipelineState) {
        tracing::debug!(source_key = %self.source_key, state = %state, "Pipeline transition");
        self.transitions.push(state);
    }

    fn fail(&mut self, reason: FailureReason, message: impl Into<String>) -> PipelineError {
        let err = PipelineError::new(self.source_key, self.state(), reason, message);
        self.transitions.push(PipelineState::Failed);
        if reason.is_recoverable() {
            tracing::warn!(
                source_key = %self.source_key,
                state = %err.state,
                reason = %reason,
                error = %err.message,
                "Thumbnail generation failed, awaiting redelivery"
            );
        } else {
            tracing::error!(
                source_key = %self.source_key,
                state = %err.state,
                reason = %reason,
                error = %err.message,
                "Thumbnail generation failed permanently"
            );
        }
        err
    }

    fn fail_storage(&mut self, err: StorageError) -> PipelineError {
        let reason = match &err {
            StorageError::NotFound(_) => FailureReason::NotFound,
            StorageError::InvalidKey(_) => FailureReason::InvalidKey,
            e if e.is_transient() => FailureReason::Transient,
            e if e.is_misconfiguration() => FailureReason::Misconfigured,
            _ => FailureReason::Internal,
        };
        self.fail(reason, err.to_string()).with_source(err)
    }

    fn fail_transform(&mut self, err: TransformError) -> PipelineError {
        let reason = match &err {
            TransformError::UnsupportedFormat(_) => FailureReason::UnsupportedFormat,
            TransformError::Corrupt(_) => FailureReason::Corrupt,
        };
        self.fail(reason, err.to_string()).with_source(err)
    }
}

impl DerivativePipeline {
    pub fn new(storage: Arc<dyn Storage>, config: PipelineConfig) -> Self {
        Self { storage, config }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Process one creation event.
    ///
    /// Transient storage failures are returned, not retried here; the caller
    /// (platform or trigger queue) decides whether to redeliver.
    #[tracing::instrument(
        skip(self, event),
        fields(source_key = %event.source_key, delivery_attempt = event.delivery_attempt)
    )]
    pub async fn handle(&self, event: &TriggerEvent) -> Result<PipelineOutcome, PipelineError> {
        let start = Instant::now();
        let source_key = event.source_key.as_str();
        let mut run = Run::new(source_key);

        run.enter(PipelineState::Received);
        tracing::info!(
            source_key = %source_key,
            event_id = ?event.event_id,
            "Creation event received"
        );
        ensure_key_safe(source_key).map_err(|e| run.fail_storage(e))?;

        run.enter(PipelineState::Fetching);
        let data = self.fetch(source_key, &mut run).await?;
        let source_bytes = data.len();

        run.enter(PipelineState::Transforming);
        let format = ImageTransformer::detect_format(&data).map_err(|e| run.fail_transform(e))?;
        let max_edge = self.config.max_edge;
        let transformed =
            tokio::task::spawn_blocking(move || ImageTransformer::apply(&data, format, max_edge))
                .await;
        let thumbnail = match transformed {
            Ok(result) => result.map_err(|e| run.fail_transform(e))?,
            Err(join_err) if join_err.is_panic() => {
                return Err(run.fail(
                    FailureReason::Corrupt,
                    format!("decoder panicked: {}", join_err),
                ));
            }
            Err(join_err) => {
                return Err(run.fail(
                    FailureReason::Internal,
                    format!("transform cancelled: {}", join_err),
                ));
            }
        };
        let thumbnail_bytes = thumbnail.len();

        run.enter(PipelineState::Publishing);
        let derived_key = derive_derived_key(source_key);
        let url = self
            .storage
            .put_bytes(Location::Derived, &derived_key, thumbnail, true)
            .await
            .map_err(|e| run.fail_storage(e))?;

        run.enter(PipelineState::Done);
        tracing::info!(
            source_key = %source_key,
            derived_key = %derived_key,
            format = %format,
            source_bytes,
            thumbnail_bytes,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Thumbnail published"
        );

        Ok(PipelineOutcome {
            source_key: source_key.to_string(),
            derived_key,
            url,
            format,
            transitions: run.transitions,
        })
    }

    /// Read the whole source, refusing anything over the size limit.
    async fn fetch(&self, source_key: &str, run: &mut Run<'_>) -> Result<Bytes, PipelineError> {
        let mut stream = self
            .storage
            .get(Location::Source, source_key)
            .await
            .map_err(|e| run.fail_storage(e))?;

        let mut buffer = BytesMut::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| run.fail_storage(e))?;
            if buffer.len() + chunk.len() > self.config.max_source_bytes {
                return Err(run.fail(
                    FailureReason::Corrupt,
                    format!(
                        "source exceeds {} bytes",
                        self.config.max_source_bytes
                    ),
                ));
            }
            buffer.extend_from_slice(&chunk);
        }
        Ok(buffer.freeze())
    }
}

#[async_trait]
impl EventHandler for DerivativePipeline {
    async fn handle_event(&self, event: &TriggerEvent) -> Result<PipelineOutcome, PipelineError> {
        self.handle(event).await
    }
}
