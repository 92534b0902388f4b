//! Usage, analytics and AI suggestion integration tests.

mod common;

use axum::http::StatusCode;
use common::{user, user_header, TestHarness};
use serde_json::{json, Value};

async fn create_draft(harness: &TestHarness, owner: &'static str) -> String {
    let body: Value = harness
        .server
        .post("/api/drafts")
        .add_header(user_header(), user(owner))
        .json(&json!({ "title": "Measured", "content": "Body" }))
        .await
        .json();
    body["data"]["id"].as_str().unwrap_or_default().to_string()
}

#[tokio::test]
async fn usage_summary_for_new_user() {
    let harness = TestHarness::new().await;

    let response = harness
        .server
        .get("/api/usage")
        .add_header(user_header(), user("alice"))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["plan"], "free");
    let metrics = body["data"]["metrics"].as_array().cloned().unwrap_or_default();
    assert_eq!(metrics.len(), 3);
    assert!(metrics.iter().all(|m| m["used"] == 0));
}

#[tokio::test]
async fn recorded_events_show_up_in_overview() {
    let harness = TestHarness::new().await;
    let draft_id = create_draft(&harness, "alice").await;
    let recorded_at = chrono::Utc::now().timestamp() - 3_600;

    for (platform, reads) in [("devto", 40), ("hashnode", 2)] {
        harness
            .server
            .post("/api/analytics/events")
            .add_header(user_header(), user("alice"))
            .json(&json!({
                "draft_id": draft_id,
                "platform": platform,
                "recorded_at": recorded_at,
                "reads": reads,
                "reactions": 1,
            }))
            .await
            .assert_status_ok();
    }

    let response = harness
        .server
        .get("/api/analytics/overview")
        .add_header(user_header(), user("alice"))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["result"]["reads"], 42);
    assert_eq!(body["data"]["result"]["reactions"], 2);
    assert_eq!(body["data"]["result"]["posts"], 1);

    let platforms: Value = harness
        .server
        .get("/api/analytics/platforms")
        .add_header(user_header(), user("alice"))
        .await
        .json();
    assert_eq!(platforms["data"]["result"].as_array().map(Vec::len), Some(2));

    let other: Value = harness
        .server
        .get("/api/analytics/overview")
        .add_header(user_header(), user("bob"))
        .await
        .json();
    assert_eq!(other["data"]["result"]["reads"], 0);
}

#[tokio::test]
async fn events_for_foreign_drafts_are_not_found() {
    let harness = TestHarness::new().await;
    let draft_id = create_draft(&harness, "alice").await;

    harness
        .server
        .post("/api/analytics/events")
        .add_header(user_header(), user("bob"))
        .json(&json!({ "draft_id": draft_id, "platform": "devto", "reads": 1 }))
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn unknown_analytics_view_is_a_bad_request() {
    let harness = TestHarness::new().await;

    harness
        .server
        .get("/api/analytics/heatmap")
        .add_header(user_header(), user("alice"))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    harness
        .server
        .get("/api/analytics/overview?from=200&to=100")
        .add_header(user_header(), user("alice"))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn suggestion_without_provider_key_is_unavailable() {
    let harness = TestHarness::new().await;

    let response = harness
        .server
        .post("/api/ai/suggest")
        .add_header(user_header(), user("alice"))
        .json(&json!({ "purpose": "title", "input": "A post about lighthouses" }))
        .await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert!(!body["error"].as_str().unwrap_or_default().is_empty());
}
