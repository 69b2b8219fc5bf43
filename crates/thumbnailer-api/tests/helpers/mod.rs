//! Test helpers: build AppState and router for integration tests.
//!
//! Run from workspace root: `cargo test -p thumbnailer-api`.

#![allow(dead_code)]

pub mod fixtures;
pub mod storage;

use axum_test::TestServer;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use thumbnailer_api::setup::{build_state, routes};
use thumbnailer_api::AppState;
use thumbnailer_core::{
    Config, StorageBackend, StorageConfig, TriggerConfig, TriggerMode, UploadConfig,
};
use thumbnailer_storage::{LocalStorage, ObjectStoreStorage, Storage};

/// Test application: server, state, and owned resources.
pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub _temp_dir: Option<TempDir>,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.state.storage
    }
}

/// Configuration for tests: fast redelivery, small worker pool.
pub fn test_config(backend: StorageBackend, mode: TriggerMode) -> Config {
    Config {
        server_port: 0,
        environment: "test".to_string(),
        log_format: "compact".to_string(),
        storage: StorageConfig::new(backend),
        upload: UploadConfig::default(),
        trigger: TriggerConfig {
            mode,
            max_workers: 2,
            max_deliveries: 3,
            timeout_seconds: 30,
            redelivery_base_ms: 10,
            channel_capacity: 64,
        },
        thumbnail_max_edge: 256,
        max_source_size_bytes: 100 * 1024 * 1024,
    }
}

/// In-memory storage with in-process event delivery.
pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(test_config(StorageBackend::Memory, TriggerMode::InProcess)).await
}

/// In-memory storage built from `config`'s container names.
pub async fn setup_test_app_with(config: Config) -> TestApp {
    let storage: Arc<dyn Storage> = Arc::new(ObjectStoreStorage::in_memory(
        &config.storage.source_container,
        &config.storage.derived_container,
        None,
    ));
    setup_test_app_with_storage(config, storage, None)
}

/// Local filesystem storage under a temporary directory.
pub async fn setup_local_test_app() -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let mut config = test_config(StorageBackend::Local, TriggerMode::InProcess);
    config.storage.local_storage_path = Some(temp_dir.path().to_string_lossy().to_string());
    config.storage.public_base_url = Some("http://localhost:7071/files".to_string());

    let storage: Arc<dyn Storage> = Arc::new(
        LocalStorage::new(
            temp_dir.path(),
            "http://localhost:7071/files".to_string(),
            &config.storage.source_container,
            &config.storage.derived_container,
        )
        .await
        .expect("Failed to create local storage"),
    );
    setup_test_app_with_storage(config, storage, Some(temp_dir))
}

pub fn setup_test_app_with_storage(
    config: Config,
    storage: Arc<dyn Storage>,
    temp_dir: Option<TempDir>,
) -> TestApp {
    let state = build_state(config, storage);
    let app = routes::setup_routes(state.clone());
    let server = TestServer::new(app).expect("Failed to create test server");
    TestApp {
        server,
        state,
        _temp_dir: temp_dir,
    }
}

/// Poll `/api/list` until it holds at least `count` entries.
pub async fn wait_for_thumbnails(client: &TestServer, count: usize) -> Vec<Value> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let response = client.get("/api/list").await;
        assert_eq!(response.status_code(), 200);
        let entries: Vec<Value> = response.json();
        if entries.len() >= count {
            return entries;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!(
                "timed out waiting for {} thumbnails, have {}",
                count,
                entries.len()
            );
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
