//! Trigger queue: in-process delivery of creation events to the pipeline.
//!
//! Plays the platform's role for backends without native eventing: a bounded
//! channel of events, a worker pool limited by a semaphore, a deadline per
//! invocation, and at-least-once redelivery of recoverable failures.
//!
//! Shutdown: [`TriggerQueue::shutdown`] stops the pool from taking new events;
//! it does not wait for in-flight invocations. Events still in the channel are
//! dropped, which is safe because any later delivery converges.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::sleep;

use thumbnailer_core::{TriggerConfig, TriggerEvent};

use crate::context::EventHandler;
use crate::pipeline::FailureReason;

/// Upper bound on the delay before a redelivery.
pub const MAX_REDELIVERY_BACKOFF_MS: u64 = 60_000;

/// Backoff before delivering an event for the `delivery_attempt + 1`th time.
#[inline]
pub(crate) fn compute_redelivery_backoff(base_ms: u64, delivery_attempt: u32) -> Duration {
    let exponent = delivery_attempt.saturating_sub(1).min(20);
    let ms = base_ms
        .saturating_mul(2_u64.pow(exponent))
        .min(MAX_REDELIVERY_BACKOFF_MS);
    Duration::from_millis(ms)
}

/// Final fate of an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    Completed { derived_key: String, url: String },
    /// Terminal failure; never redelivered.
    Failed(FailureReason),
    /// Recoverable failure on the last allowed delivery.
    Exhausted(FailureReason),
}

/// Sent once per event when it reaches a final status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventReport {
    pub source_key: String,
    pub deliveries: u32,
    pub status: DeliveryStatus,
}

/// Optional sender to notify when an event reaches a final status.
pub type EventReportSender = mpsc::Sender<EventReport>;

#[derive(Debug, Clone)]
pub struct TriggerQueueConfig {
    pub max_workers: usize,
    /// Total deliveries per event, the first one included.
    pub max_deliveries: u32,
    pub invocation_timeout: Duration,
    pub redelivery_base_ms: u64,
    pub channel_capacity: usize,
}

impl Default for TriggerQueueConfig {
    fn default() -> Self {
        Self::from(&TriggerConfig::default())
    }
}

impl From<&TriggerConfig> for TriggerQueueConfig {
    fn from(config: &TriggerConfig) -> Self {
        Self {
            max_workers: config.max_workers.max(1),
            max_deliveries: config.max_deliveries.max(1),
            invocation_timeout: Duration::from_secs(config.timeout_seconds),
            redelivery_base_ms: config.redelivery_base_ms,
            channel_capacity: config.channel_capacity.max(1),
        }
    }
}

#[derive(Clone)]
pub struct TriggerQueue {
    event_tx: mpsc::Sender<TriggerEvent>,
    shutdown_tx: mpsc::Sender<()>,
}

impl TriggerQueue {
    /// Create a queue and spawn its worker pool.
    pub fn new(
        handler: Arc<dyn EventHandler>,
        config: TriggerQueueConfig,
        report_tx: Option<EventReportSender>,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::channel(config.channel_capacity);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let redeliver_tx = event_tx.clone();
        tokio::spawn(async move {
            Self::worker_pool(handler, config, event_rx, redeliver_tx, shutdown_rx, report_tx)
                .await;
        });

        Self {
            event_tx,
            shutdown_tx,
        }
    }

    /// Enqueue a creation event for delivery.
    ///
    /// Waits while the channel is full; fails only after shutdown.
    #[tracing::instrument(skip(self, event), fields(source_key = %event.source_key))]
    pub async fn publish(&self, event: TriggerEvent) -> Result<()> {
        self.event_tx
            .send(event)
            .await
            .map_err(|_| anyhow::anyhow!("Trigger queue is shut down"))?;
        tracing::debug!("Event published to trigger queue");
        Ok(())
    }

    async fn worker_pool(
        handler: Arc<dyn EventHandler>,
        config: TriggerQueueConfig,
        mut event_rx: mpsc::Receiver<TriggerEvent>,
        redeliver_tx: mpsc::Sender<TriggerEvent>,
        mut shutdown_rx: mpsc::Receiver<()>,
        report_tx: Option<EventReportSender>,
    ) {
        tracing::info!(
            max_workers = config.max_workers,
            max_deliveries = config.max_deliveries,
            timeout_secs = config.invocation_timeout.as_secs(),
            "Trigger queue worker pool started"
        );

        let semaphore = Arc::new(Semaphore::new(config.max_workers));

        loop {
            let event = tokio::select! {
                _ = shutdown_rx.recv() => break,
                event = event_rx.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            let permit = tokio::select! {
                _ = shutdown_rx.recv() => break,
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let handler = handler.clone();
            let config = config.clone();
            let redeliver_tx = redeliver_tx.clone();
            let report_tx = report_tx.clone();
            tokio::spawn(async move {
                let redelivery = {
                    let _permit = permit;
                    Self::deliver(event, handler.as_ref(), &config, report_tx.as_ref()).await
                };

                if let Some((next, backoff)) = redelivery {
                    sleep(backoff).await;
                    if redeliver_tx.send(next).await.is_err() {
                        tracing::warn!("Trigger queue closed before redelivery");
                    }
                }
            });
        }

        tracing::info!("Trigger queue worker pool stopped");
    }

    /// Run one delivery. Returns the event to redeliver and when, if any.
    #[tracing::instrument(
        skip(handler, config, report_tx),
        fields(source_key = %event.source_key, delivery_attempt = event.delivery_attempt)
    )]
    async fn deliver(
        event: TriggerEvent,
        handler: &dyn EventHandler,
        config: &TriggerQueueConfig,
        report_tx: Option<&EventReportSender>,
    ) -> Option<(TriggerEvent, Duration)> {
        let result = tokio::time::timeout(config.invocation_timeout, handler.handle_event(&event)).await;

        let reason = match result {
            Ok(Ok(outcome)) => {
                Self::report(
                    report_tx,
                    &event,
                    DeliveryStatus::Completed {
                        derived_key: outcome.derived_key,
                        url: outcome.url,
                    },
                )
                .await;
                return None;
            }
            Ok(Err(e)) => e.reason,
            Err(_) => {
                tracing::error!(
                    timeout_secs = config.invocation_timeout.as_secs(),
                    "Pipeline invocation timed out"
                );
                FailureReason::Transient
            }
        };

        if !reason.is_recoverable() {
            tracing::info!(reason = %reason, "Terminal failure, event will not be redelivered");
            Self::report(report_tx, &event, DeliveryStatus::Failed(reason)).await;
            return None;
        }

        if event.delivery_attempt >= config.max_deliveries {
            tracing::error!(
                reason = %reason,
                max_deliveries = config.max_deliveries,
                "Event failed after maximum deliveries"
            );
            Self::report(report_tx, &event, DeliveryStatus::Exhausted(reason)).await;
            return None;
        }

        let backoff = compute_redelivery_backoff(config.redelivery_base_ms, event.delivery_attempt);
        tracing::info!(
            reason = %reason,
            next_attempt = event.delivery_attempt + 1,
            backoff_ms = backoff.as_millis() as u64,
            "Scheduling event redelivery"
        );
        Some((event.redelivered(), backoff))
    }

    async fn report(report_tx: Option<&EventReportSender>, event: &TriggerEvent, status: DeliveryStatus) {
        if let Some(tx) = report_tx {
            let _ = tx
                .send(EventReport {
                    source_key: event.source_key.clone(),
                    deliveries: event.delivery_attempt,
                    status,
                })
                .await;
        }
    }

    /// Signals the worker pool to stop taking events and exit its main loop.
    ///
    /// Returns immediately; invocations already running continue until they
    /// finish or time out.
    pub async fn shutdown(&self) {
        tracing::info!("Initiating trigger queue shutdown");
        let _ = self.shutdown_tx.send(()).await;
    }
}
