//! Database operations for Quillcast

use std::path::Path;

use serde::Serialize;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;

use secrecy::{ExposeSecret, SecretString};

use crate::error::{DbError, QuillcastError, Result};
use crate::types::{
    AnalyticsEvent, BillingSubscription, Draft, Integration, IntegrationStatus, Publication,
    ScheduledPost, ScheduledStatus,
};

/// Per-status counts of a user's scheduled posts
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct QueueStats {
    pub pending: i64,
    pub published: i64,
    pub failed: i64,
    pub cancelled: i64,
    /// Earliest `scheduled_at` among pending posts
    pub next_due: Option<i64>,
}

/// Result of recording a failed scheduled dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureRecord {
    pub status: ScheduledStatus,
    pub retry_count: u32,
}

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database at `db_path` and run migrations
    pub async fn new(db_path: &str) -> Result<Self> {
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(DbError::IoError)?;
        }

        // mode=rwc creates the file when missing
        let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(DbError::SqlxError)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(DbError::MigrationError)?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ----- drafts -----

    pub async fn create_draft(&self, draft: &Draft) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO drafts (id, user_id, title, content, status, platforms, thumbnail_url,
                                tags, created_at, updated_at, published_at, scheduled_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&draft.id)
        .bind(&draft.user_id)
        .bind(&draft.title)
        .bind(&draft.content)
        .bind(draft.status.as_str())
        .bind(encode_list(&draft.platforms))
        .bind(&draft.thumbnail_url)
        .bind(encode_list(&draft.tags))
        .bind(draft.created_at)
        .bind(draft.updated_at)
        .bind(draft.published_at)
        .bind(draft.scheduled_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    pub async fn get_draft(&self, draft_id: &str) -> Result<Option<Draft>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, title, content, status, platforms, thumbnail_url, tags,
                   created_at, updated_at, published_at, scheduled_at
            FROM drafts WHERE id = ?
            "#,
        )
        .bind(draft_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        row.map(|r| draft_from_row(&r)).transpose()
    }

    /// Drafts owned by `user_id`, most recently edited first
    pub async fn list_drafts(&self, user_id: &str, limit: u32) -> Result<Vec<Draft>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, title, content, status, platforms, thumbnail_url, tags,
                   created_at, updated_at, published_at, scheduled_at
            FROM drafts WHERE user_id = ?
            ORDER BY updated_at DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        rows.iter().map(draft_from_row).collect()
    }

    /// Persist the editable fields of a draft
    pub async fn update_draft(&self, draft: &Draft) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE drafts
            SET title = ?, content = ?, platforms = ?, thumbnail_url = ?, tags = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&draft.title)
        .bind(&draft.content)
        .bind(encode_list(&draft.platforms))
        .bind(&draft.thumbnail_url)
        .bind(encode_list(&draft.tags))
        .bind(draft.updated_at)
        .bind(&draft.id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    pub async fn mark_draft_published(&self, draft_id: &str, published_at: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE drafts
            SET status = 'published', published_at = ?, scheduled_at = NULL, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(published_at)
        .bind(published_at)
        .bind(draft_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    pub async fn mark_draft_scheduled(&self, draft_id: &str, scheduled_at: i64, now: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE drafts SET status = 'scheduled', scheduled_at = ?, updated_at = ?
            WHERE id = ? AND status != 'published'
            "#,
        )
        .bind(scheduled_at)
        .bind(now)
        .bind(draft_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// Return a scheduled draft to the plain `draft` state
    pub async fn unschedule_draft(&self, draft_id: &str, now: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE drafts SET status = 'draft', scheduled_at = NULL, updated_at = ?
            WHERE id = ? AND status = 'scheduled'
            "#,
        )
        .bind(now)
        .bind(draft_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// Delete a draft owned by `user_id`; scheduled posts and analytics cascade
    pub async fn delete_draft(&self, user_id: &str, draft_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM drafts WHERE id = ? AND user_id = ?")
            .bind(draft_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() > 0)
    }

    // ----- integrations -----

    /// Insert or replace the user's connection to a platform
    pub async fn upsert_integration(&self, integration: &Integration) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO integrations (id, user_id, platform, api_key, api_secret, access_token,
                                      refresh_token, publication_id, status, auto_publish,
                                      sync_interval_minutes, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id, platform) DO UPDATE SET
                api_key = excluded.api_key,
                api_secret = excluded.api_secret,
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                publication_id = excluded.publication_id,
                status = excluded.status,
                auto_publish = excluded.auto_publish,
                sync_interval_minutes = excluded.sync_interval_minutes,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&integration.id)
        .bind(&integration.user_id)
        .bind(&integration.platform)
        .bind(integration.api_key.expose_secret())
        .bind(integration.api_secret.as_ref().map(|s| s.expose_secret().to_string()))
        .bind(integration.access_token.as_ref().map(|s| s.expose_secret().to_string()))
        .bind(integration.refresh_token.as_ref().map(|s| s.expose_secret().to_string()))
        .bind(&integration.publication_id)
        .bind(integration.status.as_str())
        .bind(integration.auto_publish)
        .bind(integration.sync_interval_minutes)
        .bind(integration.created_at)
        .bind(integration.updated_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    pub async fn get_integration(&self, user_id: &str, platform: &str) -> Result<Option<Integration>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, platform, api_key, api_secret, access_token, refresh_token,
                   publication_id, status, auto_publish, sync_interval_minutes, created_at, updated_at
            FROM integrations WHERE user_id = ? AND platform = ?
            "#,
        )
        .bind(user_id)
        .bind(platform)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        row.map(|r| integration_from_row(&r)).transpose()
    }

    pub async fn list_integrations(&self, user_id: &str) -> Result<Vec<Integration>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, platform, api_key, api_secret, access_token, refresh_token,
                   publication_id, status, auto_publish, sync_interval_minutes, created_at, updated_at
            FROM integrations WHERE user_id = ?
            ORDER BY platform
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        rows.iter().map(integration_from_row).collect()
    }

    pub async fn set_integration_status(
        &self,
        user_id: &str,
        platform: &str,
        status: IntegrationStatus,
        now: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE integrations SET status = ?, updated_at = ? WHERE user_id = ? AND platform = ?",
        )
        .bind(status.as_str())
        .bind(now)
        .bind(user_id)
        .bind(platform)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_integration(&self, user_id: &str, platform: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM integrations WHERE user_id = ? AND platform = ?")
            .bind(user_id)
            .bind(platform)
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() > 0)
    }

    // ----- scheduled posts -----

    pub async fn create_scheduled_post(&self, post: &ScheduledPost) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO scheduled_posts (id, draft_id, user_id, platforms, scheduled_at, status,
                                         retry_count, last_error, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post.id)
        .bind(&post.draft_id)
        .bind(&post.user_id)
        .bind(encode_list(&post.platforms))
        .bind(post.scheduled_at)
        .bind(post.status.as_str())
        .bind(post.retry_count as i64)
        .bind(&post.last_error)
        .bind(post.created_at)
        .bind(post.updated_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    pub async fn get_scheduled_post(&self, id: &str) -> Result<Option<ScheduledPost>> {
        let row = sqlx::query(
            r#"
            SELECT id, draft_id, user_id, platforms, scheduled_at, status, retry_count,
                   last_error, created_at, updated_at
            FROM scheduled_posts WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        row.map(|r| scheduled_from_row(&r)).transpose()
    }

    /// Pending posts whose time has come, oldest first
    pub async fn due_scheduled_posts(&self, now: i64, limit: u32) -> Result<Vec<ScheduledPost>> {
        let rows = sqlx::query(
            r#"
            SELECT id, draft_id, user_id, platforms, scheduled_at, status, retry_count,
                   last_error, created_at, updated_at
            FROM scheduled_posts
            WHERE status = 'pending' AND scheduled_at <= ?
            ORDER BY scheduled_at ASC
            LIMIT ?
            "#,
        )
        .bind(now)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        rows.iter().map(scheduled_from_row).collect()
    }

    pub async fn list_scheduled_posts(
        &self,
        user_id: &str,
        status: Option<ScheduledStatus>,
    ) -> Result<Vec<ScheduledPost>> {
        let rows = sqlx::query(
            r#"
            SELECT id, draft_id, user_id, platforms, scheduled_at, status, retry_count,
                   last_error, created_at, updated_at
            FROM scheduled_posts
            WHERE user_id = ? AND (? IS NULL OR status = ?)
            ORDER BY scheduled_at ASC
            "#,
        )
        .bind(user_id)
        .bind(status.map(|s| s.as_str()))
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        rows.iter().map(scheduled_from_row).collect()
    }

    /// Move a pending post to `published`
    pub async fn mark_scheduled_published(&self, id: &str, now: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE scheduled_posts SET status = 'published', last_error = NULL, updated_at = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// Count a failed attempt, moving the post to `failed` once retries run out
    pub async fn record_scheduled_failure(
        &self,
        id: &str,
        error: &str,
        max_retries: u32,
        now: i64,
    ) -> Result<Option<FailureRecord>> {
        let row = sqlx::query(
            r#"
            UPDATE scheduled_posts
            SET retry_count = retry_count + 1,
                last_error = ?,
                status = CASE WHEN retry_count + 1 >= ? THEN 'failed' ELSE 'pending' END,
                updated_at = ?
            WHERE id = ? AND status = 'pending'
            RETURNING status, retry_count
            "#,
        )
        .bind(error)
        .bind(max_retries as i64)
        .bind(now)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        row.map(|r| {
            Ok(FailureRecord {
                status: parse_column(&r, "status", "scheduled_posts")?,
                retry_count: r.get::<i64, _>("retry_count") as u32,
            })
        })
        .transpose()
    }

    /// Cancel a pending post owned by `user_id`
    pub async fn cancel_scheduled_post(&self, user_id: &str, id: &str, now: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE scheduled_posts SET status = 'cancelled', updated_at = ?
            WHERE id = ? AND user_id = ? AND status = 'pending'
            "#,
        )
        .bind(now)
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() > 0)
    }

    /// Cancel every pending post of a draft, returning how many were cancelled
    pub async fn cancel_pending_for_draft(&self, draft_id: &str, now: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE scheduled_posts SET status = 'cancelled', updated_at = ?
            WHERE draft_id = ? AND status = 'pending'
            "#,
        )
        .bind(now)
        .bind(draft_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected())
    }

    pub async fn count_pending_for_draft(&self, draft_id: &str) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM scheduled_posts
            WHERE draft_id = ? AND status = 'pending'
            "#,
        )
        .bind(draft_id)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(count.max(0) as u64)
    }

    /// Move a pending post to a new time, clearing its retry state
    pub async fn reschedule_post(
        &self,
        user_id: &str,
        id: &str,
        scheduled_at: i64,
        now: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE scheduled_posts
            SET scheduled_at = ?, retry_count = 0, last_error = NULL, updated_at = ?
            WHERE id = ? AND user_id = ? AND status = 'pending'
            "#,
        )
        .bind(scheduled_at)
        .bind(now)
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn queue_stats(&self, user_id: &str) -> Result<QueueStats> {
        let rows = sqlx::query(
            r#"
            SELECT status, COUNT(*) AS total, MIN(scheduled_at) AS earliest
            FROM scheduled_posts WHERE user_id = ?
            GROUP BY status
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        let mut stats = QueueStats::default();
        for row in &rows {
            let total: i64 = row.get("total");
            match parse_column::<ScheduledStatus>(row, "status", "scheduled_posts")? {
                ScheduledStatus::Pending => {
                    stats.pending = total;
                    stats.next_due = row.get("earliest");
                }
                ScheduledStatus::Published => stats.published = total,
                ScheduledStatus::Failed => stats.failed = total,
                ScheduledStatus::Cancelled => stats.cancelled = total,
            }
        }

        Ok(stats)
    }

    // ----- publications -----

    pub async fn create_publication(&self, publication: &Publication) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO publications (draft_id, platform, platform_post_id, url, success,
                                      error_message, published_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&publication.draft_id)
        .bind(&publication.platform)
        .bind(&publication.platform_post_id)
        .bind(&publication.url)
        .bind(publication.success)
        .bind(&publication.error_message)
        .bind(publication.published_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// Dispatch history of a draft, newest first
    pub async fn list_publications(&self, draft_id: &str) -> Result<Vec<Publication>> {
        let rows = sqlx::query(
            r#"
            SELECT id, draft_id, platform, platform_post_id, url, success, error_message, published_at
            FROM publications WHERE draft_id = ?
            ORDER BY published_at DESC, id DESC
            "#,
        )
        .bind(draft_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(rows
            .iter()
            .map(|r| Publication {
                id: r.get("id"),
                draft_id: r.get("draft_id"),
                platform: r.get("platform"),
                platform_post_id: r.get("platform_post_id"),
                url: r.get("url"),
                success: r.get("success"),
                error_message: r.get("error_message"),
                published_at: r.get("published_at"),
            })
            .collect())
    }

    // ----- billing -----

    pub async fn upsert_subscription(&self, subscription: &BillingSubscription) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO billing_subscriptions (user_id, price_id, status, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                price_id = excluded.price_id,
                status = excluded.status,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&subscription.user_id)
        .bind(&subscription.price_id)
        .bind(subscription.status.as_str())
        .bind(subscription.updated_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    pub async fn get_subscription(&self, user_id: &str) -> Result<Option<BillingSubscription>> {
        let row = sqlx::query(
            "SELECT user_id, price_id, status, updated_at FROM billing_subscriptions WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        row.map(|r| {
            Ok(BillingSubscription {
                user_id: r.get("user_id"),
                price_id: r.get("price_id"),
                status: parse_column(&r, "status", "billing_subscriptions")?,
                updated_at: r.get("updated_at"),
            })
        })
        .transpose()
    }

    // ----- analytics -----

    /// Append an engagement snapshot, returning its row id
    pub async fn insert_analytics_event(&self, event: &AnalyticsEvent) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO analytics_events (draft_id, platform, recorded_at, reads, reactions, clicks, shares)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&event.draft_id)
        .bind(&event.platform)
        .bind(event.recorded_at)
        .bind(event.reads)
        .bind(event.reactions)
        .bind(event.clicks)
        .bind(event.shares)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.last_insert_rowid())
    }
}

fn encode_list(items: &[String]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}

fn decode_list(row: &SqliteRow, column: &str, table: &'static str) -> Result<Vec<String>> {
    let raw: String = row.get(column);
    serde_json::from_str(&raw).map_err(|e| {
        DbError::CorruptRow {
            table,
            reason: format!("{}: {}", column, e),
        }
        .into()
    })
}

fn parse_column<T>(row: &SqliteRow, column: &str, table: &'static str) -> Result<T>
where
    T: std::str::FromStr<Err = QuillcastError>,
{
    let raw: String = row.get(column);
    raw.parse().map_err(|_| {
        DbError::CorruptRow {
            table,
            reason: format!("{}: unexpected value '{}'", column, raw),
        }
        .into()
    })
}

fn draft_from_row(r: &SqliteRow) -> Result<Draft> {
    Ok(Draft {
        id: r.get("id"),
        user_id: r.get("user_id"),
        title: r.get("title"),
        content: r.get("content"),
        status: parse_column(r, "status", "drafts")?,
        platforms: decode_list(r, "platforms", "drafts")?,
        thumbnail_url: r.get("thumbnail_url"),
        tags: decode_list(r, "tags", "drafts")?,
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
        published_at: r.get("published_at"),
        scheduled_at: r.get("scheduled_at"),
    })
}

fn integration_from_row(r: &SqliteRow) -> Result<Integration> {
    let secret = |column: &str| -> Option<SecretString> {
        r.get::<Option<String>, _>(column).map(SecretString::from)
    };

    Ok(Integration {
        id: r.get("id"),
        user_id: r.get("user_id"),
        platform: r.get("platform"),
        api_key: SecretString::from(r.get::<String, _>("api_key")),
        api_secret: secret("api_secret"),
        access_token: secret("access_token"),
        refresh_token: secret("refresh_token"),
        publication_id: r.get("publication_id"),
        status: parse_column(r, "status", "integrations")?,
        auto_publish: r.get("auto_publish"),
        sync_interval_minutes: r.get("sync_interval_minutes"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    })
}

fn scheduled_from_row(r: &SqliteRow) -> Result<ScheduledPost> {
    Ok(ScheduledPost {
        id: r.get("id"),
        draft_id: r.get("draft_id"),
        user_id: r.get("user_id"),
        platforms: decode_list(r, "platforms", "scheduled_posts")?,
        scheduled_at: r.get("scheduled_at"),
        status: parse_column(r, "status", "scheduled_posts")?,
        retry_count: r.get::<i64, _>("retry_count") as u32,
        last_error: r.get("last_error"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    })
}
