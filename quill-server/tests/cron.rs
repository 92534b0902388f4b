//! Cron endpoint integration tests.

mod common;

use std::sync::Arc;

use axum::http::header::AUTHORIZATION;
use common::{bearer, TestHarness, CRON_SECRET};
use libquillcast::platforms::mock::MockPublisher;
use libquillcast::service::{ConnectRequest, DraftInput};
use libquillcast::types::{ScheduledPost, ScheduledStatus};
use serde_json::Value;

/// A post for `alice` that fell due a minute ago
async fn seed_due_post(harness: &TestHarness) -> ScheduledPost {
    let service = &harness.service;
    service
        .connect_integration(
            "alice",
            ConnectRequest {
                platform: "devto".to_string(),
                api_key: "key".to_string(),
                publication_id: None,
            },
        )
        .await
        .unwrap();
    let draft = service
        .create_draft("alice", DraftInput::titled("Due", "Body"))
        .await
        .unwrap();

    let due_at = chrono::Utc::now().timestamp() - 60;
    service
        .database()
        .mark_draft_scheduled(&draft.id, due_at, due_at - 60)
        .await
        .unwrap();
    let post = ScheduledPost::new(&draft, vec!["devto".to_string()], due_at);
    service.database().create_scheduled_post(&post).await.unwrap();
    post
}

async fn stored_status(harness: &TestHarness, id: &str) -> Option<ScheduledStatus> {
    harness
        .service
        .database()
        .get_scheduled_post(id)
        .await
        .unwrap()
        .map(|p| p.status)
}

#[tokio::test]
async fn wrong_secret_is_rejected_without_side_effects() {
    let harness = TestHarness::new().await;
    let post = seed_due_post(&harness).await;

    let response = harness
        .server
        .post("/api/cron/scheduled-posts")
        .add_header(AUTHORIZATION, bearer("not-the-secret"))
        .await;

    response.assert_status_unauthorized();
    assert_eq!(harness.devto.publish_call_count(), 0);
    assert_eq!(stored_status(&harness, &post.id).await, Some(ScheduledStatus::Pending));
}

#[tokio::test]
async fn missing_authorization_is_rejected() {
    let harness = TestHarness::new().await;

    let response = harness.server.get("/api/cron/scheduled-posts").await;

    response.assert_status_unauthorized();
}

#[tokio::test]
async fn correct_secret_runs_a_sweep() {
    let harness = TestHarness::new().await;
    let post = seed_due_post(&harness).await;

    let response = harness
        .server
        .get("/api/cron/scheduled-posts")
        .add_header(AUTHORIZATION, bearer(CRON_SECRET))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["processed"], 1);
    assert_eq!(body["data"]["published"], 1);
    assert!(body["timestamp"].is_string());

    assert_eq!(harness.devto.publish_call_count(), 1);
    assert_eq!(stored_status(&harness, &post.id).await, Some(ScheduledStatus::Published));
}

#[tokio::test]
async fn failed_publish_is_reported_as_retry() {
    let harness = TestHarness::with_publisher(Arc::new(MockPublisher::failure("devto", "Upstream down"))).await;
    let post = seed_due_post(&harness).await;

    let response = harness
        .server
        .post("/api/cron/scheduled-posts")
        .add_header(AUTHORIZATION, bearer(CRON_SECRET))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["retried"], 1);
    assert_eq!(stored_status(&harness, &post.id).await, Some(ScheduledStatus::Pending));
}

#[tokio::test]
async fn endpoint_is_open_without_a_secret() {
    let harness = TestHarness::with_config(|config| config.server.cron_secret = None).await;

    let response = harness.server.post("/api/cron/scheduled-posts").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["processed"], 0);
}
