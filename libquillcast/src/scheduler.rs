//! Scheduled-post processor
//!
//! A sweep picks up `pending` posts whose time has passed, oldest first and
//! at most `batch_size` of them, and dispatches each exactly once. The same
//! sweep backs both the cron endpoint and the internal timer.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::analytics::AnalyticsService;
use crate::db::FailureRecord;
use crate::error::Result;
use crate::publish::{Dispatcher, PublishOptions};
use crate::rate_limit::FixedWindowLimiter;
use crate::types::{DraftStatus, ScheduledPost, ScheduledStatus};
use crate::Database;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepItem {
    pub scheduled_post_id: String,
    pub draft_id: String,
    pub status: ScheduledStatus,
    pub retry_count: u32,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub processed: usize,
    pub published: usize,
    /// Failed this time but left pending for the next sweep
    pub retried: usize,
    /// Moved to the terminal `failed` state
    pub failed: usize,
    /// Dropped because the draft was published some other way
    pub cancelled: usize,
    /// Another sweep was already running
    pub skipped: bool,
    pub outcomes: Vec<SweepItem>,
}

pub struct ScheduledPostProcessor {
    db: Arc<Database>,
    dispatcher: Dispatcher,
    batch_size: u32,
    max_retries: u32,
    analytics: Option<Arc<AnalyticsService>>,
    limiters: Vec<Arc<FixedWindowLimiter>>,
    sweep_lock: Mutex<()>,
}

impl ScheduledPostProcessor {
    pub fn new(db: Arc<Database>, dispatcher: Dispatcher, batch_size: u32, max_retries: u32) -> Self {
        Self {
            db,
            dispatcher,
            batch_size: batch_size.max(1),
            max_retries: max_retries.max(1),
            analytics: None,
            limiters: Vec::new(),
            sweep_lock: Mutex::new(()),
        }
    }

    /// Purge expired analytics cache entries on every timer tick
    pub fn with_analytics(mut self, analytics: Arc<AnalyticsService>) -> Self {
        self.analytics = Some(analytics);
        self
    }

    /// Drop stale windows of `limiter` on every timer tick
    pub fn with_rate_limiter(mut self, limiter: Arc<FixedWindowLimiter>) -> Self {
        self.limiters.push(limiter);
        self
    }

    /// Evict expired in-memory state: analytics cache entries and
    /// rate-limit windows that ended before `now`
    pub fn housekeeping(&self, now: i64) {
        if let Some(analytics) = &self.analytics {
            analytics.purge_expired();
        }
        for limiter in &self.limiters {
            limiter.cleanup(now);
        }
    }

    /// Process every due post once
    ///
    /// Overlapping calls return immediately with `skipped` set. A database
    /// error while recording an outcome aborts the sweep, so a published
    /// post is never reported without its row leaving `pending`.
    pub async fn sweep(&self, now: i64) -> Result<SweepReport> {
        let Ok(_guard) = self.sweep_lock.try_lock() else {
            debug!("Sweep already in progress, skipping");
            return Ok(SweepReport {
                skipped: true,
                ..SweepReport::default()
            });
        };

        let due = self.db.due_scheduled_posts(now, self.batch_size).await?;
        let mut report = SweepReport::default();

        if due.is_empty() {
            return Ok(report);
        }

        info!(count = due.len(), "Processing due scheduled posts");

        for post in due {
            let item = self.process(&post, now).await?;
            match item.status {
                ScheduledStatus::Published => report.published += 1,
                ScheduledStatus::Failed => report.failed += 1,
                ScheduledStatus::Cancelled => report.cancelled += 1,
                ScheduledStatus::Pending => report.retried += 1,
            }
            report.processed += 1;
            report.outcomes.push(item);
        }

        info!(
            processed = report.processed,
            published = report.published,
            retried = report.retried,
            failed = report.failed,
            cancelled = report.cancelled,
            "Sweep finished"
        );

        Ok(report)
    }

    async fn process(&self, post: &ScheduledPost, now: i64) -> Result<SweepItem> {
        let already_published = self
            .db
            .get_draft(&post.draft_id)
            .await?
            .map_or(true, |d| d.status == DraftStatus::Published);
        if already_published {
            info!(
                scheduled_post_id = %post.id,
                draft_id = %post.draft_id,
                "Draft already published, cancelling scheduled post"
            );
            self.db.cancel_pending_for_draft(&post.draft_id, now).await?;
            return Ok(SweepItem {
                scheduled_post_id: post.id.clone(),
                draft_id: post.draft_id.clone(),
                status: ScheduledStatus::Cancelled,
                retry_count: post.retry_count,
                message: "Draft already published".to_string(),
            });
        }

        let dispatched = self
            .dispatcher
            .dispatch(&post.draft_id, &post.platforms, &PublishOptions::default())
            .await;

        let error_text = match dispatched {
            Ok(outcome) if outcome.any_succeeded() => {
                self.db
                    .mark_scheduled_published(&post.id, now)
                    .await
                    .inspect_err(|e| {
                        error!(scheduled_post_id = %post.id, error = %e, "Failed to mark post published")
                    })?;
                return Ok(SweepItem {
                    scheduled_post_id: post.id.clone(),
                    draft_id: post.draft_id.clone(),
                    status: ScheduledStatus::Published,
                    retry_count: post.retry_count,
                    message: outcome.message(),
                });
            }
            Ok(outcome) => outcome.message(),
            Err(e) => e.to_string(),
        };

        let record = self
            .db
            .record_scheduled_failure(&post.id, &error_text, self.max_retries, now)
            .await
            .inspect_err(|e| {
                error!(scheduled_post_id = %post.id, error = %e, "Failed to record dispatch failure")
            })?
            .unwrap_or(FailureRecord {
                status: ScheduledStatus::Cancelled,
                retry_count: post.retry_count,
            });

        if record.status == ScheduledStatus::Failed {
            warn!(
                scheduled_post_id = %post.id,
                retries = record.retry_count,
                "Scheduled post failed permanently"
            );
            if let Err(e) = self.db.unschedule_draft(&post.draft_id, now).await {
                warn!(draft_id = %post.draft_id, error = %e, "Failed to reset draft status");
            }
        } else {
            warn!(
                scheduled_post_id = %post.id,
                attempt = record.retry_count,
                max_retries = self.max_retries,
                "Scheduled post failed, will retry on next sweep"
            );
        }

        Ok(SweepItem {
            scheduled_post_id: post.id.clone(),
            draft_id: post.draft_id.clone(),
            status: record.status,
            retry_count: record.retry_count,
            message: error_text,
        })
    }

    /// Sweep every `interval` until `shutdown` resolves
    pub async fn run<F>(&self, interval: Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(interval_secs = interval.as_secs(), "Scheduler started");

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping scheduler");
                    break;
                }
                _ = ticker.tick() => {
                    let now = chrono::Utc::now().timestamp();
                    if let Err(e) = self.sweep(now).await {
                        error!(error = %e, "Error processing scheduled posts");
                    }
                    self.housekeeping(now);
                }
            }
        }
    }
}
