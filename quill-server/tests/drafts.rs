//! Draft, integration, publish and schedule integration tests.

mod common;

use axum::http::StatusCode;
use common::{user, user_header, TestHarness};
use serde_json::{json, Value};

async fn connect_devto(harness: &TestHarness, owner: &'static str) {
    harness
        .server
        .post("/api/integrations")
        .add_header(user_header(), user(owner))
        .json(&json!({ "platform": "devto", "api_key": "dev-key" }))
        .await
        .assert_status_ok();
}

async fn create_draft(harness: &TestHarness, owner: &'static str, title: &str) -> String {
    let response = harness
        .server
        .post("/api/drafts")
        .add_header(user_header(), user(owner))
        .json(&json!({ "title": title, "content": "Body text", "platforms": ["devto"] }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    body["data"]["id"].as_str().unwrap_or_default().to_string()
}

// ============================================================================
// Drafts
// ============================================================================

#[tokio::test]
async fn create_and_fetch_draft() {
    let harness = TestHarness::new().await;
    let id = create_draft(&harness, "alice", "  First post  ").await;

    let response = harness
        .server
        .get(&format!("/api/drafts/{}", id))
        .add_header(user_header(), user("alice"))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["title"], "First post");
    assert_eq!(body["data"]["status"], "draft");
}

#[tokio::test]
async fn draft_without_title_is_rejected() {
    let harness = TestHarness::new().await;

    let response = harness
        .server
        .post("/api/drafts")
        .add_header(user_header(), user("alice"))
        .json(&json!({ "title": "   ", "content": "Body" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn drafts_are_scoped_to_their_owner() {
    let harness = TestHarness::new().await;
    let id = create_draft(&harness, "alice", "Private").await;

    harness
        .server
        .get(&format!("/api/drafts/{}", id))
        .add_header(user_header(), user("mallory"))
        .await
        .assert_status_not_found();

    let response = harness
        .server
        .get("/api/drafts")
        .add_header(user_header(), user("mallory"))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"].as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn update_and_delete_draft() {
    let harness = TestHarness::new().await;
    let id = create_draft(&harness, "alice", "Before").await;

    let response = harness
        .server
        .put(&format!("/api/drafts/{}", id))
        .add_header(user_header(), user("alice"))
        .json(&json!({ "title": "After" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["title"], "After");
    assert_eq!(body["data"]["content"], "Body text");

    harness
        .server
        .delete(&format!("/api/drafts/{}", id))
        .add_header(user_header(), user("alice"))
        .await
        .assert_status_ok();

    harness
        .server
        .get(&format!("/api/drafts/{}", id))
        .add_header(user_header(), user("alice"))
        .await
        .assert_status_not_found();
}

// ============================================================================
// Integrations
// ============================================================================

#[tokio::test]
async fn connect_list_and_disconnect_integration() {
    let harness = TestHarness::new().await;
    connect_devto(&harness, "alice").await;

    let response = harness
        .server
        .get("/api/integrations")
        .add_header(user_header(), user("alice"))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    let listed = body["data"].to_string();
    assert!(listed.contains("devto"));
    assert!(!listed.contains("dev-key"));

    harness
        .server
        .delete("/api/integrations/devto")
        .add_header(user_header(), user("alice"))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn unknown_platform_is_a_bad_request() {
    let harness = TestHarness::new().await;

    let response = harness
        .server
        .post("/api/integrations")
        .add_header(user_header(), user("alice"))
        .json(&json!({ "platform": "myspace", "api_key": "k" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

// ============================================================================
// Publish and schedule
// ============================================================================

#[tokio::test]
async fn publish_draft_to_connected_platform() {
    let harness = TestHarness::new().await;
    connect_devto(&harness, "alice").await;
    let id = create_draft(&harness, "alice", "Ship it").await;

    let response = harness
        .server
        .post(&format!("/api/drafts/{}/publish", id))
        .add_header(user_header(), user("alice"))
        .json(&json!({}))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["message"], "Published to 1 of 1 platforms");
    assert_eq!(harness.devto.publish_call_count(), 1);
    assert_eq!(harness.devto.published_titles(), vec!["Ship it".to_string()]);

    let draft: Value = harness
        .server
        .get(&format!("/api/drafts/{}", id))
        .add_header(user_header(), user("alice"))
        .await
        .json();
    assert_eq!(draft["data"]["status"], "published");
}

#[tokio::test]
async fn sixth_article_on_free_plan_is_forbidden() {
    let harness = TestHarness::new().await;
    connect_devto(&harness, "alice").await;

    for n in 0..5 {
        let id = create_draft(&harness, "alice", &format!("Post {}", n)).await;
        harness
            .server
            .post(&format!("/api/drafts/{}/publish", id))
            .add_header(user_header(), user("alice"))
            .json(&json!({}))
            .await
            .assert_status_ok();
    }

    let id = create_draft(&harness, "alice", "One too many").await;
    let response = harness
        .server
        .post(&format!("/api/drafts/{}/publish", id))
        .add_header(user_header(), user("alice"))
        .json(&json!({}))
        .await;

    response.assert_status(StatusCode::FORBIDDEN);
    let body: Value = response.json();
    assert_eq!(body["metric"], "articles_published");
    assert_eq!(body["limit"], 5);
    assert_eq!(harness.devto.publish_call_count(), 5);
}

#[tokio::test]
async fn schedule_list_and_cancel() {
    let harness = TestHarness::new().await;
    connect_devto(&harness, "alice").await;
    let id = create_draft(&harness, "alice", "Later").await;

    let response = harness
        .server
        .post(&format!("/api/drafts/{}/schedule", id))
        .add_header(user_header(), user("alice"))
        .json(&json!({ "when": "in 2h" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    let post_id = body["data"]["id"].as_str().unwrap_or_default().to_string();
    assert_eq!(body["data"]["status"], "pending");

    let stats: Value = harness
        .server
        .get("/api/scheduled/stats")
        .add_header(user_header(), user("alice"))
        .await
        .json();
    assert_eq!(stats["data"]["pending"], 1);

    let listed: Value = harness
        .server
        .get("/api/scheduled?status=pending")
        .add_header(user_header(), user("alice"))
        .await
        .json();
    assert_eq!(listed["data"].as_array().map(Vec::len), Some(1));

    harness
        .server
        .delete(&format!("/api/scheduled/{}", post_id))
        .add_header(user_header(), user("alice"))
        .await
        .assert_status_ok();

    let draft: Value = harness
        .server
        .get(&format!("/api/drafts/{}", id))
        .add_header(user_header(), user("alice"))
        .await
        .json();
    assert_eq!(draft["data"]["status"], "draft");
}

#[tokio::test]
async fn schedule_in_the_past_is_rejected() {
    let harness = TestHarness::new().await;
    let id = create_draft(&harness, "alice", "Too late").await;

    let response = harness
        .server
        .post(&format!("/api/drafts/{}/schedule", id))
        .add_header(user_header(), user("alice"))
        .json(&json!({ "when": "2020-01-01T00:00:00Z" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}
