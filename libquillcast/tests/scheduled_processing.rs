//! Scheduled-post processing through the service facade

use std::sync::Arc;

use anyhow::Result;
use libquillcast::platforms::mock::MockPublisher;
use libquillcast::platforms::PublisherRegistry;
use libquillcast::service::{ConnectRequest, DraftInput};
use libquillcast::types::{DraftStatus, ScheduledPost, ScheduledStatus, UsageMetric};
use libquillcast::{Config, Database, PublishOptions, QuillcastService};
use tempfile::TempDir;

async fn create_service(publisher: Arc<MockPublisher>) -> Result<(TempDir, QuillcastService)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let db = Arc::new(Database::new(&db_path.to_string_lossy()).await?);

    let mut registry = PublisherRegistry::new();
    registry.register(publisher);

    let mut config = Config::default();
    config.scheduler.max_retries = 2;
    let service = QuillcastService::from_parts(config, db, registry, reqwest::Client::new())?;

    service
        .connect_integration(
            "alice",
            ConnectRequest {
                platform: "devto".to_string(),
                api_key: "key".to_string(),
                publication_id: None,
            },
        )
        .await?;
    Ok((temp_dir, service))
}

/// Insert a post that became due at `scheduled_at`
async fn due_post(service: &QuillcastService, scheduled_at: i64) -> Result<ScheduledPost> {
    let draft = service
        .create_draft("alice", DraftInput::titled("Queued", "Body"))
        .await?;
    service
        .database()
        .mark_draft_scheduled(&draft.id, scheduled_at, scheduled_at - 60)
        .await?;
    let post = ScheduledPost::new(&draft, vec!["devto".to_string()], scheduled_at);
    service.database().create_scheduled_post(&post).await?;
    Ok(post)
}

#[tokio::test]
async fn test_due_post_is_published_once() -> Result<()> {
    let devto = Arc::new(MockPublisher::success("devto"));
    let (_temp_dir, service) = create_service(devto.clone()).await?;
    let post = due_post(&service, 1_000).await?;

    let processor = service.processor();
    let report = processor.sweep(1_001).await?;
    assert_eq!(report.processed, 1);
    assert_eq!(report.published, 1);

    let again = processor.sweep(1_060).await?;
    assert_eq!(again.processed, 0);
    assert_eq!(devto.publish_call_count(), 1);

    let stored = service.database().get_scheduled_post(&post.id).await?;
    assert_eq!(stored.map(|p| p.status), Some(ScheduledStatus::Published));
    let draft = service.get_draft("alice", &post.draft_id).await?;
    assert_eq!(draft.status, DraftStatus::Published);
    Ok(())
}

#[tokio::test]
async fn test_exhausted_retries_stay_failed() -> Result<()> {
    let devto = Arc::new(MockPublisher::failure("devto", "Gateway timeout"));
    let (_temp_dir, service) = create_service(devto.clone()).await?;
    let post = due_post(&service, 1_000).await?;
    let processor = service.processor();

    let first = processor.sweep(1_001).await?;
    assert_eq!(first.retried, 1);
    let second = processor.sweep(1_061).await?;
    assert_eq!(second.failed, 1);

    for tick in 0..3 {
        let report = processor.sweep(2_000 + tick * 60).await?;
        assert_eq!(report.processed, 0);
    }
    assert_eq!(devto.publish_call_count(), 2);

    let stored = service
        .database()
        .get_scheduled_post(&post.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("scheduled post disappeared"))?;
    assert_eq!(stored.status, ScheduledStatus::Failed);
    assert_eq!(stored.retry_count, 2);
    assert!(stored
        .last_error
        .unwrap_or_default()
        .contains("Gateway timeout"));

    let stats = service.queue_stats("alice").await?;
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.pending, 0);
    Ok(())
}

#[tokio::test]
async fn test_cancelled_post_is_never_dispatched() -> Result<()> {
    let devto = Arc::new(MockPublisher::success("devto"));
    let (_temp_dir, service) = create_service(devto.clone()).await?;
    let post = due_post(&service, 1_000).await?;

    service.cancel_scheduled("alice", &post.id).await?;
    let report = service.processor().sweep(5_000).await?;

    assert_eq!(report.processed, 0);
    assert_eq!(devto.publish_call_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_deleted_draft_removes_its_schedule() -> Result<()> {
    let devto = Arc::new(MockPublisher::success("devto"));
    let (_temp_dir, service) = create_service(devto.clone()).await?;
    let post = due_post(&service, 1_000).await?;

    service.delete_draft("alice", &post.draft_id).await?;
    let report = service.processor().sweep(5_000).await?;

    assert_eq!(report.processed, 0);
    assert!(service.database().get_scheduled_post(&post.id).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_publishing_now_supersedes_the_schedule() -> Result<()> {
    let devto = Arc::new(MockPublisher::success("devto"));
    let (_temp_dir, service) = create_service(devto.clone()).await?;

    let mut input = DraftInput::titled("Early bird", "Body");
    input.platforms = Some(vec!["devto".to_string()]);
    let draft = service.create_draft("alice", input).await?;
    let post = service.schedule_draft("alice", &draft.id, None, "1h").await?;

    let outcome = service
        .publish_draft("alice", &draft.id, None, &PublishOptions::default())
        .await?;
    assert!(outcome.any_succeeded());

    let report = service.processor().sweep(post.scheduled_at + 1).await?;
    assert_eq!(report.published, 0);
    assert_eq!(devto.publish_call_count(), 1);

    let stored = service.database().get_scheduled_post(&post.id).await?;
    assert_eq!(stored.map(|p| p.status), Some(ScheduledStatus::Cancelled));

    let articles = service
        .usage_summary("alice")
        .await?
        .metrics
        .iter()
        .find(|m| m.metric == UsageMetric::ArticlesPublished)
        .map(|m| m.used);
    assert_eq!(articles, Some(1));
    Ok(())
}
