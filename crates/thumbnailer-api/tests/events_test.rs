//! Trigger intake tests: platform-delivered creation events.
//!
//! Run with: `cargo test -p thumbnailer-api --test events_test`

mod helpers;

use bytes::Bytes;
use helpers::storage::UnavailableStorage;
use helpers::{fixtures, setup_test_app_with, setup_test_app_with_storage, test_config};
use serde_json::{json, Value};
use std::sync::Arc;
use thumbnailer_core::{Location, StorageBackend, TriggerMode};

fn external_config() -> thumbnailer_core::Config {
    test_config(StorageBackend::Memory, TriggerMode::External)
}

#[tokio::test]
async fn test_event_for_existing_source_creates_thumbnail() {
    let app = setup_test_app_with(external_config()).await;
    app.storage()
        .put_bytes(
            Location::Source,
            "6f1c1c52-3f0a-4c36-9f7e-1d2b3c4d5e6f-cat.png",
            Bytes::from(fixtures::create_test_png(1024, 512)),
            false,
        )
        .await
        .unwrap();

    let response = app
        .client()
        .post("/api/events")
        .json(&json!({ "source_key": "6f1c1c52-3f0a-4c36-9f7e-1d2b3c4d5e6f-cat.png" }))
        .await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["results"][0]["status"], "completed");
    assert_eq!(body["results"][0]["derived_key"], "cat.png");

    let thumbnail = app
        .storage()
        .get_bytes(Location::Derived, "cat.png")
        .await
        .unwrap();
    assert_eq!(fixtures::inspect(&thumbnail).0, (256, 128));
}

#[tokio::test]
async fn test_repeated_event_converges() {
    let app = setup_test_app_with(external_config()).await;
    app.storage()
        .put_bytes(
            Location::Source,
            "dog.png",
            Bytes::from(fixtures::create_test_png(600, 800)),
            false,
        )
        .await
        .unwrap();

    let event = json!([{ "key": "dog.png" }, { "key": "dog.png", "delivery_attempt": 2 }]);
    let first = app.client().post("/api/events").json(&event).await;
    assert_eq!(first.status_code(), 200);
    let after_first = app
        .storage()
        .get_bytes(Location::Derived, "dog.png")
        .await
        .unwrap();

    let second = app.client().post("/api/events").json(&event).await;
    assert_eq!(second.status_code(), 200);
    let after_second = app
        .storage()
        .get_bytes(Location::Derived, "dog.png")
        .await
        .unwrap();

    assert_eq!(after_first, after_second);
    let entries: Vec<Value> = app.client().get("/api/list").await.json();
    assert_eq!(entries.len(), 1);
}

#[tokio::test]
async fn test_event_for_deleted_source_is_terminal() {
    let app = setup_test_app_with(external_config()).await;

    let response = app
        .client()
        .post("/api/events")
        .json(&json!({ "source_key": "gone.png" }))
        .await;

    // Terminal: acknowledged so the platform does not redeliver.
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["results"][0]["status"], "failed");
    assert_eq!(body["results"][0]["reason"], "not_found");
    assert_eq!(body["results"][0]["recoverable"], false);

    let entries: Vec<Value> = app.client().get("/api/list").await.json();
    assert!(entries.is_empty());
}

#[tokio::test]
async fn test_corrupt_source_is_terminal_and_writes_nothing() {
    let app = setup_test_app_with(external_config()).await;
    let mut data = fixtures::create_test_png(800, 600);
    data.truncate(data.len() / 3);
    app.storage()
        .put_bytes(Location::Source, "broken.png", Bytes::from(data), false)
        .await
        .unwrap();

    let response = app
        .client()
        .post("/api/events")
        .json(&json!({ "source_key": "broken.png" }))
        .await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["results"][0]["reason"], "corrupt");
    let entries: Vec<Value> = app.client().get("/api/list").await.json();
    assert!(entries.is_empty());
}

#[tokio::test]
async fn test_transient_failure_asks_for_redelivery() {
    let app = setup_test_app_with_storage(external_config(), Arc::new(UnavailableStorage::new()), None);

    let response = app
        .client()
        .post("/api/events")
        .json(&json!({ "source_key": "photo.png" }))
        .await;

    assert_eq!(response.status_code(), 503);
    let body: Value = response.json();
    assert_eq!(body["results"][0]["reason"], "transient");
    assert_eq!(body["results"][0]["recoverable"], true);
}

#[tokio::test]
async fn test_blob_subject_outside_source_is_ignored() {
    let app = setup_test_app_with(external_config()).await;

    let response = app
        .client()
        .post("/api/events")
        .json(&json!({
            "subject": "/blobServices/default/containers/thumbnails/blobs/photo.png",
            "id": "evt-42"
        }))
        .await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["results"][0]["status"], "ignored");
}

#[tokio::test]
async fn test_blob_subject_in_source_is_processed() {
    let app = setup_test_app_with(external_config()).await;
    app.storage()
        .put_bytes(
            Location::Source,
            "bird.gif",
            Bytes::from(fixtures::create_test_image(
                400,
                100,
                image::ImageFormat::Gif,
            )),
            false,
        )
        .await
        .unwrap();

    let response = app
        .client()
        .post("/api/events")
        .json(&json!({ "subject": "images/bird.gif" }))
        .await;

    assert_eq!(response.status_code(), 200);
    let thumbnail = app
        .storage()
        .get_bytes(Location::Derived, "bird.gif")
        .await
        .unwrap();
    assert_eq!(
        fixtures::inspect(&thumbnail),
        ((256, 64), image::ImageFormat::Gif)
    );
}

#[tokio::test]
async fn test_malformed_event_body_is_rejected() {
    let app = setup_test_app_with(external_config()).await;

    let response = app
        .client()
        .post("/api/events")
        .json(&json!({ "unexpected": true }))
        .await;

    assert!(response.status_code().is_client_error());
}
