//! Common test utilities for quill-server integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue};
use axum::Router;
use axum_test::TestServer;
use tempfile::TempDir;

use libquillcast::platforms::mock::MockPublisher;
use libquillcast::platforms::PublisherRegistry;
use libquillcast::{Config, Database, QuillcastService};
use quill_server::{create_router, AppState};

pub const CRON_SECRET: &str = "test-cron-secret";

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    pub server: TestServer,
    pub service: Arc<QuillcastService>,
    /// Mock publisher registered as `devto`
    pub devto: Arc<MockPublisher>,
    /// Kept alive for the duration of the test
    pub _temp_dir: TempDir,
}

impl TestHarness {
    /// Fresh database, a cron secret and a succeeding `devto` publisher.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(customize: impl FnOnce(&mut Config)) -> Self {
        Self::build(Arc::new(MockPublisher::success("devto")), customize).await
    }

    pub async fn with_publisher(devto: Arc<MockPublisher>) -> Self {
        Self::build(devto, |_| {}).await
    }

    async fn build(devto: Arc<MockPublisher>, customize: impl FnOnce(&mut Config)) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("test.db");
        let db = Arc::new(
            Database::new(&db_path.to_string_lossy())
                .await
                .expect("Failed to open database"),
        );

        let mut config = Config::default();
        config.database.path = db_path.to_string_lossy().to_string();
        config.server.cron_secret = Some(CRON_SECRET.to_string());
        customize(&mut config);

        let mut registry = PublisherRegistry::new();
        registry.register(devto.clone());

        let service = Arc::new(
            QuillcastService::from_parts(config, db, registry, reqwest::Client::new())
                .expect("Failed to build service"),
        );
        let router: Router = create_router(AppState::new(service.clone()));
        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            service,
            devto,
            _temp_dir: temp_dir,
        }
    }
}

pub fn user_header() -> HeaderName {
    HeaderName::from_static("x-user-id")
}

pub fn user(id: &'static str) -> HeaderValue {
    HeaderValue::from_static(id)
}

pub fn bearer(secret: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {}", secret)).expect("valid header value")
}
