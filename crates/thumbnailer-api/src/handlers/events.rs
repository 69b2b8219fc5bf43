use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use thumbnailer_core::TriggerEvent;
use thumbnailer_worker::{FailureReason, PipelineOutcome};
use utoipa::ToSchema;

use crate::error::ErrorResponse;
use crate::state::AppState;

/// Storage platform notification that only carries the blob path.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct BlobCreatedEvent {
    /// `"{container}/{name}"` or `"/blobServices/default/containers/{container}/blobs/{name}"`.
    pub subject: String,
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum IncomingEvent {
    Trigger(TriggerEvent),
    BlobCreated(BlobCreatedEvent),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum EventBatch {
    One(IncomingEvent),
    Many(Vec<IncomingEvent>),
}

impl EventBatch {
    fn into_events(self) -> Vec<IncomingEvent> {
        match self {
            EventBatch::One(event) => vec![event],
            EventBatch::Many(events) => events,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Completed,
    Failed,
    /// The notification does not name an object in the source location.
    Ignored,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EventResult {
    pub subject: String,
    pub status: EventStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub derived_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// True when redelivering the event can succeed.
    pub recoverable: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EventsResponse {
    pub results: Vec<EventResult>,
}

/// Receive creation events from the storage platform
///
/// Runs the derivative pipeline for each event before answering. Responds 503
/// when any event failed recoverably so the platform redelivers the batch;
/// reprocessing the events that already succeeded converges to the same
/// thumbnails.
#[utoipa::path(
    post,
    path = "/api/events",
    tag = "events",
    request_body = Vec<TriggerEvent>,
    responses(
        (status = 200, description = "Every event completed or failed terminally", body = EventsResponse),
        (status = 400, description = "Malformed event body", body = ErrorResponse),
        (status = 503, description = "At least one event should be redelivered", body = EventsResponse)
    )
)]
#[tracing::instrument(skip(state, batch), fields(operation = "receive_events"))]
pub async fn receive_events(
    State(state): State<Arc<AppState>>,
    Json(batch): Json<EventBatch>,
) -> (StatusCode, Json<EventsResponse>) {
    let events = batch.into_events();
    tracing::debug!(count = events.len(), "Creation events received");

    let source_container = state.config.storage.source_container.as_str();
    let results = join_all(
        events
            .into_iter()
            .map(|event| process_event(&state, source_container, event)),
    )
    .await;

    let status = if results.iter().any(|r| r.recoverable) {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (status, Json(EventsResponse { results }))
}

async fn process_event(
    state: &AppState,
    source_container: &str,
    event: IncomingEvent,
) -> EventResult {
    let (subject, trigger) = match event {
        IncomingEvent::Trigger(trigger) => (trigger.source_key.clone(), Some(trigger)),
        IncomingEvent::BlobCreated(blob) => {
            let trigger = TriggerEvent::from_blob_path(&blob.subject, source_container).map(
                |mut trigger| {
                    trigger.event_id = blob.id.clone();
                    trigger
                },
            );
            (blob.subject, trigger)
        }
    };

    let Some(trigger) = trigger else {
        tracing::debug!(subject = %subject, "Event does not target the source location");
        return EventResult::ignored(subject);
    };

    match state.pipeline.handle(&trigger).await {
        Ok(outcome) => EventResult::completed(subject, outcome),
        Err(e) => EventResult::failed(subject, e.reason),
    }
}

impl EventResult {
    fn completed(subject: String, outcome: PipelineOutcome) -> Self {
        Self {
            subject,
            status: EventStatus::Completed,
            derived_key: Some(outcome.derived_key),
            url: Some(outcome.url),
            reason: None,
            recoverable: false,
        }
    }

    fn failed(subject: String, reason: FailureReason) -> Self {
        Self {
            subject,
            status: EventStatus::Failed,
            derived_key: None,
            url: None,
            reason: Some(reason.to_string()),
            recoverable: reason.is_recoverable(),
        }
    }

    fn ignored(subject: String) -> Self {
        Self {
            subject,
            status: EventStatus::Ignored,
            derived_key: None,
            url: None,
            reason: None,
            recoverable: false,
        }
    }
}
