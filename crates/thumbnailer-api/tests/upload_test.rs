//! Ingress, query and end-to-end thumbnail tests.
//!
//! Run with: `cargo test -p thumbnailer-api --test upload_test`

mod helpers;

use axum_test::multipart::{MultipartForm, Part};
use helpers::fixtures;
use helpers::storage::FaultyStorage;
use helpers::{
    setup_local_test_app, setup_test_app, setup_test_app_with, setup_test_app_with_storage,
    test_config,
};
use image::ImageFormat;
use serde_json::Value;
use std::sync::Arc;
use thumbnailer_core::{Location, StorageBackend, TriggerMode};
use thumbnailer_storage::Storage;

fn image_form(data: Vec<u8>, filename: &str, mime: &str) -> MultipartForm {
    let part = Part::bytes(bytes::Bytes::from(data))
        .file_name(filename.to_string())
        .mime_type(mime.to_string());
    MultipartForm::new().add_part("file", part)
}

#[tokio::test]
async fn test_upload_then_thumbnail_is_listed() {
    let app = setup_test_app().await;
    let client = app.client();

    let response = client
        .post("/api/upload")
        .multipart(image_form(
            fixtures::create_test_png(800, 600),
            "photo.png",
            "image/png",
        ))
        .await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    let key = body["key"].as_str().expect("key in response");
    assert!(key.ends_with("-photo.png"));
    assert_ne!(key, "photo.png");
    assert!(body["url"].as_str().unwrap().ends_with(&format!("/images/{}", key)));

    let entries = helpers::wait_for_thumbnails(client, 1).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["name"], "photo.png");
    assert!(entries[0]["url"]
        .as_str()
        .unwrap()
        .ends_with("/thumbnails/photo.png"));

    let thumbnail = app
        .storage()
        .get_bytes(Location::Derived, "photo.png")
        .await
        .expect("thumbnail stored");
    assert_eq!(fixtures::inspect(&thumbnail), ((256, 192), ImageFormat::Png));

    // The source is never modified or removed.
    let source = app.storage().get_bytes(Location::Source, key).await.unwrap();
    assert_eq!(fixtures::inspect(&source).0, (800, 600));
}

#[tokio::test]
async fn test_small_jpeg_keeps_size_and_format() {
    let app = setup_test_app().await;
    let client = app.client();

    let response = client
        .post("/api/upload")
        .multipart(image_form(
            fixtures::create_test_image(120, 80, ImageFormat::Jpeg),
            "small.jpg",
            "image/jpeg",
        ))
        .await;
    assert_eq!(response.status_code(), 200);

    let entries = helpers::wait_for_thumbnails(client, 1).await;
    assert_eq!(entries[0]["name"], "small.jpg");
    let thumbnail = app
        .storage()
        .get_bytes(Location::Derived, "small.jpg")
        .await
        .unwrap();
    assert_eq!(fixtures::inspect(&thumbnail), ((120, 80), ImageFormat::Jpeg));
}

#[tokio::test]
async fn test_same_filename_uploads_get_distinct_source_keys() {
    let app = setup_test_app().await;
    let client = app.client();

    let mut keys = Vec::new();
    for _ in 0..2 {
        let response = client
            .post("/api/upload")
            .multipart(image_form(
                fixtures::create_test_png(300, 300),
                "same.png",
                "image/png",
            ))
            .await;
        assert_eq!(response.status_code(), 200);
        let body: Value = response.json();
        keys.push(body["key"].as_str().unwrap().to_string());
    }
    assert_ne!(keys[0], keys[1]);

    // Both sources derive the same thumbnail key; the last write wins.
    let entries = helpers::wait_for_thumbnails(client, 1).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["name"], "same.png");
}

#[tokio::test]
async fn test_upload_without_file_field_is_bad_request() {
    let app = setup_test_app().await;
    let form = MultipartForm::new().add_text("description", "no file here");

    let response = app.client().post("/api/upload").multipart(form).await;

    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_upload_rejects_non_image() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post("/api/upload")
        .multipart(image_form(b"hello".to_vec(), "notes.txt", "text/plain"))
        .await;

    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["code"], "INVALID_INPUT");

    let entries: Vec<Value> = app.client().get("/api/list").await.json();
    assert!(entries.is_empty());
}

#[tokio::test]
async fn test_upload_too_large_is_413() {
    let mut config = test_config(StorageBackend::Memory, TriggerMode::InProcess);
    config.upload.max_file_size_bytes = 1024;
    let app = setup_test_app_with(config).await;

    let response = app
        .client()
        .post("/api/upload")
        .multipart(image_form(vec![7u8; 4096], "big.png", "image/png"))
        .await;

    assert_eq!(response.status_code(), 413);
}

#[tokio::test]
async fn test_list_is_empty_before_any_upload() {
    let app = setup_test_app().await;

    let response = app.client().get("/api/list").await;

    assert_eq!(response.status_code(), 200);
    let entries: Vec<Value> = response.json();
    assert!(entries.is_empty());
}

#[tokio::test]
async fn test_local_backend_serves_thumbnail_url() {
    let app = setup_local_test_app().await;
    let client = app.client();

    let response = client
        .post("/api/upload")
        .multipart(image_form(
            fixtures::create_test_png(640, 480),
            "photo.png",
            "image/png",
        ))
        .await;
    assert_eq!(response.status_code(), 200);

    let entries = helpers::wait_for_thumbnails(client, 1).await;
    assert_eq!(
        entries[0]["url"],
        "http://localhost:7071/files/thumbnails/photo.png"
    );

    let download = client.get("/files/thumbnails/photo.png").await;
    assert_eq!(download.status_code(), 200);
    assert_eq!(download.header("content-type"), "image/png");
    assert_eq!(
        fixtures::inspect(download.as_bytes()),
        ((256, 192), ImageFormat::Png)
    );
}

#[tokio::test]
async fn test_download_unknown_object_is_404() {
    let app = setup_test_app().await;

    assert_eq!(
        app.client()
            .get("/files/thumbnails/missing.png")
            .await
            .status_code(),
        404
    );
    assert_eq!(
        app.client().get("/files/other/missing.png").await.status_code(),
        404
    );
}

#[tokio::test]
async fn test_health_and_openapi() {
    let app = setup_test_app().await;

    let health = app.client().get("/healthz").await;
    assert_eq!(health.status_code(), 200);
    let body: Value = health.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["trigger_mode"], "in-process");

    let spec = app.client().get("/api-docs/openapi.json").await;
    assert_eq!(spec.status_code(), 200);
    let spec: Value = spec.json();
    assert!(spec["paths"]["/api/upload"].is_object());
}

#[tokio::test]
async fn test_upload_writes_source_with_overwrite() {
    let storage = Arc::new(FaultyStorage::new());
    let config = test_config(StorageBackend::Memory, TriggerMode::External);
    let app = setup_test_app_with_storage(config, storage.clone(), None);

    let response = app
        .client()
        .post("/api/upload")
        .multipart(image_form(
            fixtures::create_test_png(10, 10),
            "photo.png",
            "image/png",
        ))
        .await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    let puts = storage.puts();
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].0, Location::Source);
    assert_eq!(puts[0].1, body["key"].as_str().unwrap());
    assert!(puts[0].2, "ingress writes must overwrite");
}

#[tokio::test]
async fn test_upload_storage_failure_is_500() {
    let mut storage = FaultyStorage::new();
    storage.fail_puts = true;
    let storage = Arc::new(storage);
    let app = setup_test_app_with_storage(
        test_config(StorageBackend::Memory, TriggerMode::InProcess),
        storage.clone(),
        None,
    );

    let response = app
        .client()
        .post("/api/upload")
        .multipart(image_form(
            fixtures::create_test_png(10, 10),
            "photo.png",
            "image/png",
        ))
        .await;

    assert_eq!(response.status_code(), 500);
    let body: Value = response.json();
    assert_eq!(body["code"], "STORAGE_ERROR");
    assert!(body.get("key").is_none());
    assert!(storage
        .inner
        .get_bytes(Location::Derived, "photo.png")
        .await
        .is_err());
}

#[tokio::test]
async fn test_list_failure_midway_is_500_not_truncated() {
    let mut storage = FaultyStorage::new();
    storage.fail_list_midway = true;
    for name in ["a.png", "b.png"] {
        storage
            .inner
            .put_bytes(
                Location::Derived,
                name,
                bytes::Bytes::from(fixtures::create_test_png(4, 4)),
                true,
            )
            .await
            .unwrap();
    }
    let app = setup_test_app_with_storage(
        test_config(StorageBackend::Memory, TriggerMode::External),
        Arc::new(storage),
        None,
    );

    let response = app.client().get("/api/list").await;

    assert_eq!(response.status_code(), 500);
    let body: Value = response.json();
    assert!(!body.is_array());
    assert_eq!(body["code"], "STORAGE_ERROR");
}
