//! Backfill: replay a creation event for every existing source object.
//!
//! Safe to run at any time, including alongside live traffic, because every
//! pipeline run converges to the same thumbnail.

use anyhow::{Context, Result};
use futures::StreamExt;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use thumbnailer_core::{Location, TriggerEvent};
use thumbnailer_storage::Storage;
use thumbnailer_worker::{
    DeliveryStatus, EventHandler, EventReport, TriggerQueue, TriggerQueueConfig,
};
use tokio::sync::mpsc;

#[derive(Debug, Default, Serialize)]
pub struct ReprocessSummary {
    pub completed: usize,
    pub failed: usize,
    pub exhausted: usize,
    /// Failures by reason, terminal and exhausted together.
    pub reasons: BTreeMap<String, usize>,
}

impl ReprocessSummary {
    pub fn total(&self) -> usize {
        self.completed + self.failed + self.exhausted
    }

    fn record(&mut self, report: &EventReport) {
        let reason = match &report.status {
            DeliveryStatus::Completed { .. } => {
                self.completed += 1;
                return;
            }
            DeliveryStatus::Failed(reason) => {
                self.failed += 1;
                reason
            }
            DeliveryStatus::Exhausted(reason) => {
                self.exhausted += 1;
                reason
            }
        };
        tracing::warn!(
            source_key = %report.source_key,
            reason = %reason,
            deliveries = report.deliveries,
            "Reprocessing failed"
        );
        *self.reasons.entry(reason.to_string()).or_default() += 1;
    }
}

/// Publish an event for every source key under `prefix` and wait until each
/// one has reached a final status.
pub async fn reprocess(
    storage: Arc<dyn Storage>,
    handler: Arc<dyn EventHandler>,
    config: TriggerQueueConfig,
    prefix: &str,
) -> Result<ReprocessSummary> {
    let (report_tx, mut report_rx) = mpsc::channel(config.channel_capacity);
    let queue = TriggerQueue::new(handler, config, Some(report_tx));

    let mut publisher = {
        let queue = queue.clone();
        let mut listing = storage.list(Location::Source, prefix);
        tokio::spawn(async move {
            let mut published = 0usize;
            while let Some(object) = listing.next().await {
                let object = object.context("Failed to list source objects")?;
                queue.publish(TriggerEvent::new(object.key)).await?;
                published += 1;
            }
            anyhow::Ok(published)
        })
    };

    let mut summary = ReprocessSummary::default();
    let mut published: Option<usize> = None;
    loop {
        if published.is_some_and(|total| summary.total() >= total) {
            break;
        }
        tokio::select! {
            joined = &mut publisher, if published.is_none() => {
                let total = joined.context("Publisher task panicked")??;
                tracing::info!(total, "All source objects queued");
                published = Some(total);
            }
            report = report_rx.recv() => match report {
                Some(report) => summary.record(&report),
                None => break,
            },
        }
    }

    queue.shutdown().await;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::{memory_storage, png};
    use bytes::Bytes;
    use std::time::Duration;
    use thumbnailer_worker::{DerivativePipeline, PipelineConfig};

    fn queue_config() -> TriggerQueueConfig {
        TriggerQueueConfig {
            max_workers: 2,
            max_deliveries: 2,
            invocation_timeout: Duration::from_secs(30),
            redelivery_base_ms: 1,
            channel_capacity: 4,
        }
    }

    #[tokio::test]
    async fn reprocess_builds_every_missing_thumbnail() {
        let storage = memory_storage();
        for name in ["a.png", "b.png", "c.png", "d.png", "e.png", "f.png"] {
            storage
                .put_bytes(Location::Source, name, Bytes::from(png(300, 200)), false)
                .await
                .unwrap();
        }
        storage
            .put_bytes(Location::Source, "broken.png", Bytes::from_static(b"nope"), false)
            .await
            .unwrap();
        let pipeline = Arc::new(DerivativePipeline::new(
            storage.clone(),
            PipelineConfig::default(),
        ));

        let summary = reprocess(storage.clone(), pipeline, queue_config(), "")
            .await
            .unwrap();

        assert_eq!(summary.completed, 6);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.exhausted, 0);
        assert_eq!(summary.reasons.get("unsupported_format"), Some(&1));
        let derived = crate::commands::list(&storage, Location::Derived, "")
            .await
            .unwrap();
        assert_eq!(derived.len(), 6);
    }

    #[tokio::test]
    async fn reprocess_respects_prefix() {
        let storage = memory_storage();
        for name in ["2024/a.png", "2025/b.png"] {
            storage
                .put_bytes(Location::Source, name, Bytes::from(png(20, 20)), false)
                .await
                .unwrap();
        }
        let pipeline = Arc::new(DerivativePipeline::new(
            storage.clone(),
            PipelineConfig::default(),
        ));

        let summary = reprocess(storage.clone(), pipeline, queue_config(), "2025/")
            .await
            .unwrap();

        assert_eq!(summary.total(), 1);
        let derived = crate::commands::list(&storage, Location::Derived, "")
            .await
            .unwrap();
        assert_eq!(derived.len(), 1);
        assert_eq!(derived[0].key, "b.png");
    }

    #[tokio::test]
    async fn reprocess_empty_source_finishes() {
        let storage = memory_storage();
        let pipeline = Arc::new(DerivativePipeline::new(
            storage.clone(),
            PipelineConfig::default(),
        ));

        let summary = reprocess(storage, pipeline, queue_config(), "")
            .await
            .unwrap();
        assert_eq!(summary.total(), 0);
    }
}
