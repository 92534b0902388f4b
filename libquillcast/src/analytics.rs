//! Engagement rollups over recorded analytics events
//!
//! Every view joins `analytics_events` to `drafts` so a user only ever sees
//! numbers for their own posts. Results are memoized per
//! `(user, view, range)` for a fixed TTL. Recording a new event does not
//! invalidate anything; readers may see data up to one TTL old.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::Serialize;
use sqlx::Row;
use tracing::debug;

use crate::db::Database;
use crate::error::{DbError, QuillcastError, Result};
use crate::types::AnalyticsEvent;

const DAY_SECS: i64 = 86_400;
const WEEK_SECS: i64 = 7 * DAY_SECS;
/// 1970-01-05, the first Monday after the epoch
const WEEK_ANCHOR: i64 = 4 * DAY_SECS;

/// Inclusive `[from, to]` range of unix timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DateRange {
    pub from: i64,
    pub to: i64,
}

impl DateRange {
    pub fn new(from: i64, to: i64) -> Result<Self> {
        if from > to {
            return Err(QuillcastError::InvalidInput(
                "Range start must not be after its end".to_string(),
            ));
        }
        Ok(Self { from, to })
    }

    /// The `days` days ending at `now`
    pub fn last_days(now: i64, days: i64) -> Self {
        Self {
            from: now - days.max(0) * DAY_SECS,
            to: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    Week,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Day => "day",
            Granularity::Week => "week",
        }
    }

    fn bucket(&self) -> (i64, i64) {
        match self {
            Granularity::Day => (DAY_SECS, 0),
            Granularity::Week => (WEEK_SECS, WEEK_ANCHOR),
        }
    }
}

impl FromStr for Granularity {
    type Err = QuillcastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "day" => Ok(Granularity::Day),
            "week" => Ok(Granularity::Week),
            other => Err(QuillcastError::InvalidInput(format!(
                "Invalid granularity '{}': expected day or week",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Overview {
    pub reads: i64,
    pub reactions: i64,
    pub clicks: i64,
    pub shares: i64,
    /// Distinct drafts with at least one event in range
    pub posts: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeBucket {
    /// Start of the bucket; weeks start on Monday 00:00 UTC
    pub bucket_start: i64,
    pub reads: i64,
    pub reactions: i64,
    pub clicks: i64,
    pub shares: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformStats {
    pub platform: String,
    pub reads: i64,
    pub reactions: i64,
    pub clicks: i64,
    pub shares: i64,
    pub posts: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopPost {
    pub draft_id: String,
    pub title: String,
    pub reads: i64,
    pub reactions: i64,
    pub clicks: i64,
    pub shares: i64,
    pub total_engagement: i64,
}

/// One analytics view with its parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalyticsView {
    Overview,
    TimeSeries(Granularity),
    Platforms,
    TopPosts(u32),
}

impl AnalyticsView {
    /// Build a view from its URL name
    pub fn parse(name: &str, granularity: Option<Granularity>, limit: u32) -> Result<Self> {
        match name {
            "overview" => Ok(AnalyticsView::Overview),
            "timeseries" | "time-series" => {
                Ok(AnalyticsView::TimeSeries(granularity.unwrap_or(Granularity::Day)))
            }
            "platforms" => Ok(AnalyticsView::Platforms),
            "top-posts" | "top" => Ok(AnalyticsView::TopPosts(limit)),
            other => Err(QuillcastError::InvalidInput(format!(
                "Unknown analytics view: {}",
                other
            ))),
        }
    }
}

/// Computed result of any view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AnalyticsData {
    Overview(Overview),
    TimeSeries(Vec<TimeBucket>),
    Platforms(Vec<PlatformStats>),
    TopPosts(Vec<TopPost>),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    user_id: String,
    view: AnalyticsView,
    range: DateRange,
}

/// Process-wide TTL memo of computed views
pub struct AnalyticsCache {
    ttl: Duration,
    entries: Mutex<HashMap<CacheKey, (Instant, AnalyticsData)>>,
}

impl AnalyticsCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn get(&self, key: &CacheKey) -> Option<AnalyticsData> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .get(key)
            .filter(|(stored_at, _)| stored_at.elapsed() < self.ttl)
            .map(|(_, data)| data.clone())
    }

    fn insert(&self, key: CacheKey, data: AnalyticsData) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, (Instant::now(), data));
    }

    /// Drop entries older than the TTL, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|_, (stored_at, _)| stored_at.elapsed() < self.ttl);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct AnalyticsService {
    db: Arc<Database>,
    cache: AnalyticsCache,
    queries: AtomicU64,
}

impl AnalyticsService {
    pub fn new(db: Arc<Database>, ttl: Duration) -> Self {
        Self {
            db,
            cache: AnalyticsCache::new(ttl),
            queries: AtomicU64::new(0),
        }
    }

    pub fn cache(&self) -> &AnalyticsCache {
        &self.cache
    }

    /// Aggregation queries issued so far (cache misses)
    pub fn queries_issued(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }

    pub fn purge_expired(&self) {
        let removed = self.cache.purge_expired();
        if removed > 0 {
            debug!(removed, "Purged expired analytics cache entries");
        }
    }

    /// Append an engagement snapshot
    pub async fn record_event(&self, event: &AnalyticsEvent) -> Result<i64> {
        if [event.reads, event.reactions, event.clicks, event.shares]
            .iter()
            .any(|v| *v < 0)
        {
            return Err(QuillcastError::InvalidInput(
                "Engagement counts cannot be negative".to_string(),
            ));
        }
        self.db.insert_analytics_event(event).await
    }

    /// Compute `view`, serving from cache within the TTL
    pub async fn view(&self, user_id: &str, view: AnalyticsView, range: DateRange) -> Result<AnalyticsData> {
        let key = CacheKey {
            user_id: user_id.to_string(),
            view,
            range,
        };

        if let Some(hit) = self.cache.get(&key) {
            debug!(user_id = %user_id, view = ?view, "Analytics cache hit");
            return Ok(hit);
        }

        self.queries.fetch_add(1, Ordering::Relaxed);
        let data = match view {
            AnalyticsView::Overview => AnalyticsData::Overview(self.query_overview(user_id, range).await?),
            AnalyticsView::TimeSeries(granularity) => {
                AnalyticsData::TimeSeries(self.query_time_series(user_id, range, granularity).await?)
            }
            AnalyticsView::Platforms => {
                AnalyticsData::Platforms(self.query_platforms(user_id, range).await?)
            }
            AnalyticsView::TopPosts(limit) => {
                AnalyticsData::TopPosts(self.query_top_posts(user_id, range, limit).await?)
            }
        };

        self.cache.insert(key, data.clone());
        Ok(data)
    }

    pub async fn overview(&self, user_id: &str, range: DateRange) -> Result<Overview> {
        match self.view(user_id, AnalyticsView::Overview, range).await? {
            AnalyticsData::Overview(overview) => Ok(overview),
            _ => Ok(Overview::default()),
        }
    }

    pub async fn time_series(
        &self,
        user_id: &str,
        range: DateRange,
        granularity: Granularity,
    ) -> Result<Vec<TimeBucket>> {
        match self.view(user_id, AnalyticsView::TimeSeries(granularity), range).await? {
            AnalyticsData::TimeSeries(buckets) => Ok(buckets),
            _ => Ok(Vec::new()),
        }
    }

    pub async fn platform_breakdown(&self, user_id: &str, range: DateRange) -> Result<Vec<PlatformStats>> {
        match self.view(user_id, AnalyticsView::Platforms, range).await? {
            AnalyticsData::Platforms(stats) => Ok(stats),
            _ => Ok(Vec::new()),
        }
    }

    pub async fn top_posts(&self, user_id: &str, range: DateRange, limit: u32) -> Result<Vec<TopPost>> {
        match self.view(user_id, AnalyticsView::TopPosts(limit), range).await? {
            AnalyticsData::TopPosts(posts) => Ok(posts),
            _ => Ok(Vec::new()),
        }
    }

    async fn query_overview(&self, user_id: &str, range: DateRange) -> Result<Overview> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(e.reads), 0) AS reads,
                   COALESCE(SUM(e.reactions), 0) AS reactions,
                   COALESCE(SUM(e.clicks), 0) AS clicks,
                   COALESCE(SUM(e.shares), 0) AS shares,
                   COUNT(DISTINCT e.draft_id) AS posts
            FROM analytics_events e
            JOIN drafts d ON d.id = e.draft_id
            WHERE d.user_id = ? AND e.recorded_at BETWEEN ? AND ?
            "#,
        )
        .bind(user_id)
        .bind(range.from)
        .bind(range.to)
        .fetch_one(self.db.pool())
        .await
        .map_err(DbError::SqlxError)?;

        Ok(Overview {
            reads: row.get("reads"),
            reactions: row.get("reactions"),
            clicks: row.get("clicks"),
            shares: row.get("shares"),
            posts: row.get("posts"),
        })
    }

    async fn query_time_series(
        &self,
        user_id: &str,
        range: DateRange,
        granularity: Granularity,
    ) -> Result<Vec<TimeBucket>> {
        let (size, anchor) = granularity.bucket();
        let rows = sqlx::query(
            r#"
            SELECT ((e.recorded_at - ?1) / ?2) * ?2 + ?1 AS bucket_start,
                   SUM(e.reads) AS reads,
                   SUM(e.reactions) AS reactions,
                   SUM(e.clicks) AS clicks,
                   SUM(e.shares) AS shares
            FROM analytics_events e
            JOIN drafts d ON d.id = e.draft_id
            WHERE d.user_id = ?3 AND e.recorded_at BETWEEN ?4 AND ?5
            GROUP BY bucket_start
            ORDER BY bucket_start ASC
            "#,
        )
        .bind(anchor)
        .bind(size)
        .bind(user_id)
        .bind(range.from)
        .bind(range.to)
        .fetch_all(self.db.pool())
        .await
        .map_err(DbError::SqlxError)?;

        Ok(rows
            .iter()
            .map(|r| TimeBucket {
                bucket_start: r.get("bucket_start"),
                reads: r.get("reads"),
                reactions: r.get("reactions"),
                clicks: r.get("clicks"),
                shares: r.get("shares"),
            })
            .collect())
    }

    async fn query_platforms(&self, user_id: &str, range: DateRange) -> Result<Vec<PlatformStats>> {
        let rows = sqlx::query(
            r#"
            SELECT e.platform AS platform,
                   SUM(e.reads) AS reads,
                   SUM(e.reactions) AS reactions,
                   SUM(e.clicks) AS clicks,
                   SUM(e.shares) AS shares,
                   COUNT(DISTINCT e.draft_id) AS posts
            FROM analytics_events e
            JOIN drafts d ON d.id = e.draft_id
            WHERE d.user_id = ? AND e.recorded_at BETWEEN ? AND ?
            GROUP BY e.platform
            ORDER BY SUM(e.reads + e.reactions + e.clicks + e.shares) DESC, e.platform ASC
            "#,
        )
        .bind(user_id)
        .bind(range.from)
        .bind(range.to)
        .fetch_all(self.db.pool())
        .await
        .map_err(DbError::SqlxError)?;

        Ok(rows
            .iter()
            .map(|r| PlatformStats {
                platform: r.get("platform"),
                reads: r.get("reads"),
                reactions: r.get("reactions"),
                clicks: r.get("clicks"),
                shares: r.get("shares"),
                posts: r.get("posts"),
            })
            .collect())
    }

    async fn query_top_posts(&self, user_id: &str, range: DateRange, limit: u32) -> Result<Vec<TopPost>> {
        let rows = sqlx::query(
            r#"
            SELECT d.id AS draft_id,
                   d.title AS title,
                   SUM(e.reads) AS reads,
                   SUM(e.reactions) AS reactions,
                   SUM(e.clicks) AS clicks,
                   SUM(e.shares) AS shares,
                   SUM(e.reads + e.reactions + e.clicks + e.shares) AS total_engagement
            FROM analytics_events e
            JOIN drafts d ON d.id = e.draft_id
            WHERE d.user_id = ? AND e.recorded_at BETWEEN ? AND ?
            GROUP BY d.id, d.title
            ORDER BY total_engagement DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(range.from)
        .bind(range.to)
        .bind(limit as i64)
        .fetch_all(self.db.pool())
        .await
        .map_err(DbError::SqlxError)?;

        Ok(rows
            .iter()
            .map(|r| TopPost {
                draft_id: r.get("draft_id"),
                title: r.get("title"),
                reads: r.get("reads"),
                reactions: r.get("reactions"),
                clicks: r.get("clicks"),
                shares: r.get("shares"),
                total_engagement: r.get("total_engagement"),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Draft;
    use tempfile::TempDir;

    async fn setup(ttl: Duration) -> (TempDir, Arc<Database>, AnalyticsService) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Arc::new(Database::new(&db_path.to_string_lossy()).await.unwrap());
        let service = AnalyticsService::new(db.clone(), ttl);
        (temp_dir, db, service)
    }

    async fn draft(db: &Database, user: &str, title: &str) -> Draft {
        let draft = Draft::new(user, title, "Body");
        db.create_draft(&draft).await.unwrap();
        draft
    }

    fn event(draft: &Draft, platform: &str, at: i64, reads: i64, reactions: i64) -> AnalyticsEvent {
        AnalyticsEvent {
            id: None,
            draft_id: draft.id.clone(),
            platform: platform.to_string(),
            recorded_at: at,
            reads,
            reactions,
            clicks: 1,
            shares: 0,
        }
    }

    #[tokio::test]
    async fn test_overview_is_scoped_to_owner_and_range() {
        let (_temp, db, service) = setup(Duration::from_secs(120)).await;
        let mine = draft(&db, "alice", "Mine").await;
        let theirs = draft(&db, "bob", "Theirs").await;

        service.record_event(&event(&mine, "devto", 100, 10, 2)).await.unwrap();
        service.record_event(&event(&mine, "hashnode", 200, 5, 1)).await.unwrap();
        service.record_event(&event(&mine, "devto", 5_000, 99, 99)).await.unwrap();
        service.record_event(&event(&theirs, "devto", 150, 1_000, 0)).await.unwrap();

        let overview = service.overview("alice", DateRange::new(0, 1_000).unwrap()).await.unwrap();
        assert_eq!(
            overview,
            Overview {
                reads: 15,
                reactions: 3,
                clicks: 2,
                shares: 0,
                posts: 1
            }
        );
    }

    #[tokio::test]
    async fn test_empty_range_yields_zeroes() {
        let (_temp, _db, service) = setup(Duration::from_secs(120)).await;
        let overview = service.overview("nobody", DateRange::new(0, 10).unwrap()).await.unwrap();
        assert_eq!(overview, Overview::default());
        assert!(service
            .top_posts("nobody", DateRange::new(0, 10).unwrap(), 5)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_time_series_buckets() {
        let (_temp, db, service) = setup(Duration::from_secs(120)).await;
        let post = draft(&db, "alice", "Post").await;
        // Monday 2025-06-02 00:00 UTC
        let monday = 1_748_822_400;

        service.record_event(&event(&post, "devto", monday + 60, 1, 0)).await.unwrap();
        service.record_event(&event(&post, "devto", monday + 3_600, 2, 0)).await.unwrap();
        service.record_event(&event(&post, "devto", monday + DAY_SECS + 5, 4, 0)).await.unwrap();
        service.record_event(&event(&post, "devto", monday + WEEK_SECS, 8, 0)).await.unwrap();

        let range = DateRange::new(monday, monday + 2 * WEEK_SECS).unwrap();

        let daily = service.time_series("alice", range, Granularity::Day).await.unwrap();
        let days: Vec<(i64, i64)> = daily.iter().map(|b| (b.bucket_start, b.reads)).collect();
        assert_eq!(
            days,
            vec![(monday, 3), (monday + DAY_SECS, 4), (monday + WEEK_SECS, 8)]
        );

        let weekly = service.time_series("alice", range, Granularity::Week).await.unwrap();
        let weeks: Vec<(i64, i64)> = weekly.iter().map(|b| (b.bucket_start, b.reads)).collect();
        assert_eq!(weeks, vec![(monday, 7), (monday + WEEK_SECS, 8)]);
    }

    #[tokio::test]
    async fn test_platform_breakdown_and_top_posts() {
        let (_temp, db, service) = setup(Duration::from_secs(120)).await;
        let quiet = draft(&db, "alice", "Quiet").await;
        let popular = draft(&db, "alice", "Popular").await;

        service.record_event(&event(&quiet, "devto", 10, 1, 0)).await.unwrap();
        service.record_event(&event(&popular, "devto", 10, 50, 5)).await.unwrap();
        service.record_event(&event(&popular, "hashnode", 20, 100, 10)).await.unwrap();

        let range = DateRange::new(0, 100).unwrap();

        let platforms = service.platform_breakdown("alice", range).await.unwrap();
        assert_eq!(platforms[0].platform, "hashnode");
        assert_eq!(platforms[1].platform, "devto");
        assert_eq!(platforms[1].posts, 2);

        let top = service.top_posts("alice", range, 10).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].title, "Popular");
        assert_eq!(top[0].total_engagement, 150 + 15 + 2);
        assert_eq!(top[1].title, "Quiet");

        let limited = service.top_posts("alice", range, 1).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_query() {
        let (_temp, db, service) = setup(Duration::from_secs(120)).await;
        let post = draft(&db, "alice", "Post").await;
        service.record_event(&event(&post, "devto", 10, 1, 0)).await.unwrap();
        let range = DateRange::new(0, 100).unwrap();

        let first = service.overview("alice", range).await.unwrap();
        assert_eq!(service.queries_issued(), 1);

        // New events are not visible until the entry expires
        service.record_event(&event(&post, "devto", 20, 100, 0)).await.unwrap();
        let second = service.overview("alice", range).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(service.queries_issued(), 1);

        // A different range is a different key
        service.overview("alice", DateRange::new(0, 101).unwrap()).await.unwrap();
        assert_eq!(service.queries_issued(), 2);
    }

    #[tokio::test]
    async fn test_cache_expiry_recomputes() {
        let (_temp, db, service) = setup(Duration::from_millis(50)).await;
        let post = draft(&db, "alice", "Post").await;
        service.record_event(&event(&post, "devto", 10, 1, 0)).await.unwrap();
        let range = DateRange::new(0, 100).unwrap();

        let first = service.overview("alice", range).await.unwrap();
        service.record_event(&event(&post, "devto", 20, 100, 0)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(80)).await;

        let second = service.overview("alice", range).await.unwrap();
        assert_eq!(service.queries_issued(), 2);
        assert_eq!(second.reads, first.reads + 100);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let (_temp, _db, service) = setup(Duration::from_millis(20)).await;
        let range = DateRange::new(0, 100).unwrap();
        service.overview("alice", range).await.unwrap();
        service.overview("bob", range).await.unwrap();
        assert_eq!(service.cache().len(), 2);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(service.cache().purge_expired(), 2);
        assert!(service.cache().is_empty());
    }

    #[tokio::test]
    async fn test_negative_counts_rejected() {
        let (_temp, db, service) = setup(Duration::from_secs(120)).await;
        let post = draft(&db, "alice", "Post").await;
        let err = service
            .record_event(&event(&post, "devto", 10, -1, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, QuillcastError::InvalidInput(_)));
    }

    #[test]
    fn test_parse_view_and_range() {
        assert_eq!(
            AnalyticsView::parse("timeseries", Some(Granularity::Week), 10).unwrap(),
            AnalyticsView::TimeSeries(Granularity::Week)
        );
        assert_eq!(
            AnalyticsView::parse("top-posts", None, 3).unwrap(),
            AnalyticsView::TopPosts(3)
        );
        assert!(AnalyticsView::parse("funnel", None, 3).is_err());
        assert!("month".parse::<Granularity>().is_err());
        assert!(DateRange::new(10, 5).is_err());
    }
}
