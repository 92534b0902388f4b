//! Plan-based monthly usage metering
//!
//! Every metered action goes through [`UsageMeter::check_usage_limit`], which
//! increments the counter and compares the new value against the plan cap in
//! one step. The increment sticks even when the check reports
//! `allowed: false`.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Serialize, Serializer};
use sqlx::Row;

use crate::config::BillingConfig;
use crate::error::{DbError, QuillcastError, Result};
use crate::types::{month_key, UsageCounter, UsageMetric};
use crate::Database;

/// Share of a cap at which a soft warning is raised, in percent
const WARNING_THRESHOLD_PERCENT: u64 = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Free,
    Pro,
    Business,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Pro => "pro",
            Plan::Business => "business",
        }
    }

    /// Built-in caps before any configuration overrides
    pub fn default_limits(&self) -> PlanLimits {
        match self {
            Plan::Free => PlanLimits {
                articles_published: Limit::Limited(5),
                thumbnails_generated: Limit::Limited(3),
                ai_suggestions: Limit::Limited(10),
                ai_enabled: true,
            },
            Plan::Pro => PlanLimits {
                articles_published: Limit::Limited(50),
                thumbnails_generated: Limit::Limited(50),
                ai_suggestions: Limit::Limited(500),
                ai_enabled: true,
            },
            Plan::Business => PlanLimits {
                articles_published: Limit::Unlimited,
                thumbnails_generated: Limit::Unlimited,
                ai_suggestions: Limit::Unlimited,
                ai_enabled: true,
            },
        }
    }
}

impl FromStr for Plan {
    type Err = QuillcastError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "free" => Ok(Plan::Free),
            "pro" => Ok(Plan::Pro),
            "business" => Ok(Plan::Business),
            other => Err(QuillcastError::InvalidInput(format!("Unknown plan: {}", other))),
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cap on a metric; `Unlimited` never blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    Limited(u64),
    Unlimited,
}

impl Limit {
    pub fn allows(&self, value: u64) -> bool {
        match self {
            Limit::Limited(cap) => value <= *cap,
            Limit::Unlimited => true,
        }
    }

    /// Units left before the cap; `None` when unlimited
    pub fn remaining(&self, used: u64) -> Option<u64> {
        match self {
            Limit::Limited(cap) => Some(cap.saturating_sub(used)),
            Limit::Unlimited => None,
        }
    }

    fn warns_at(&self, value: u64) -> bool {
        match self {
            Limit::Limited(cap) => {
                value.saturating_mul(100) >= cap.saturating_mul(WARNING_THRESHOLD_PERCENT)
            }
            Limit::Unlimited => false,
        }
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Limit::Limited(cap) => write!(f, "{}", cap),
            Limit::Unlimited => f.write_str("unlimited"),
        }
    }
}

impl Serialize for Limit {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Limit::Limited(cap) => serializer.serialize_u64(*cap),
            Limit::Unlimited => serializer.serialize_str("unlimited"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlanLimits {
    pub articles_published: Limit,
    pub thumbnails_generated: Limit,
    pub ai_suggestions: Limit,
    pub ai_enabled: bool,
}

impl PlanLimits {
    pub fn get(&self, metric: UsageMetric) -> Limit {
        match metric {
            UsageMetric::ArticlesPublished => self.articles_published,
            UsageMetric::ThumbnailsGenerated => self.thumbnails_generated,
            UsageMetric::AiSuggestions => self.ai_suggestions,
        }
    }
}

/// Plan caps and price mappings after configuration is applied
#[derive(Debug, Clone)]
pub struct PlanCatalog {
    limits: HashMap<Plan, PlanLimits>,
    price_plans: HashMap<String, Plan>,
}

impl Default for PlanCatalog {
    fn default() -> Self {
        Self::from_config(&BillingConfig::default())
    }
}

impl PlanCatalog {
    /// Build the catalog, skipping unknown plan ids with a warning
    pub fn from_config(billing: &BillingConfig) -> Self {
        let mut limits: HashMap<Plan, PlanLimits> = [Plan::Free, Plan::Pro, Plan::Business]
            .into_iter()
            .map(|plan| (plan, plan.default_limits()))
            .collect();

        for (plan_id, over) in &billing.plan_limits {
            let Ok(plan) = plan_id.parse::<Plan>() else {
                tracing::warn!(plan = %plan_id, "Ignoring limits for unknown plan");
                continue;
            };
            if let Some(entry) = limits.get_mut(&plan) {
                if let Some(n) = over.articles_published {
                    entry.articles_published = Limit::Limited(n);
                }
                if let Some(n) = over.thumbnails_generated {
                    entry.thumbnails_generated = Limit::Limited(n);
                }
                if let Some(n) = over.ai_suggestions {
                    entry.ai_suggestions = Limit::Limited(n);
                }
                if let Some(enabled) = over.ai_enabled {
                    entry.ai_enabled = enabled;
                }
            }
        }

        let mut price_plans = HashMap::new();
        for (price_id, plan_id) in &billing.price_plans {
            match plan_id.parse::<Plan>() {
                Ok(plan) => {
                    price_plans.insert(price_id.clone(), plan);
                }
                Err(_) => {
                    tracing::warn!(price_id = %price_id, plan = %plan_id, "Ignoring price mapped to unknown plan")
                }
            }
        }

        Self { limits, price_plans }
    }

    pub fn limits(&self, plan: Plan) -> PlanLimits {
        self.limits
            .get(&plan)
            .copied()
            .unwrap_or_else(|| plan.default_limits())
    }

    /// Plan for a billing price id; a price id that is itself a plan id is accepted
    pub fn plan_for_price(&self, price_id: &str) -> Option<Plan> {
        self.price_plans
            .get(price_id)
            .copied()
            .or_else(|| price_id.parse().ok())
    }
}

/// Outcome of a single-metric check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsageCheck {
    pub metric: UsageMetric,
    pub allowed: bool,
    pub current: u64,
    pub limit: Limit,
    pub remaining: Option<u64>,
    /// Set once usage reaches 80% of a finite cap
    pub warning: bool,
}

impl UsageCheck {
    fn evaluate(metric: UsageMetric, current: u64, limit: Limit) -> Self {
        Self {
            metric,
            allowed: limit.allows(current),
            current,
            limit,
            remaining: limit.remaining(current),
            warning: limit.warns_at(current),
        }
    }

    /// Convert a disallowed check into the quota error
    pub fn into_result(self) -> Result<Self> {
        if self.allowed {
            Ok(self)
        } else {
            Err(QuillcastError::QuotaExceeded {
                metric: self.metric,
                current: self.current,
                limit: self.limit,
            })
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkUsageCheck {
    pub allowed: bool,
    pub checks: Vec<UsageCheck>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricUsage {
    pub metric: UsageMetric,
    pub used: u64,
    pub limit: Limit,
    pub remaining: Option<u64>,
}

/// Dashboard view of a user's month
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageSummary {
    pub plan: Plan,
    pub month: String,
    pub ai_enabled: bool,
    pub metrics: Vec<MetricUsage>,
}

pub struct UsageMeter {
    db: Arc<Database>,
    catalog: PlanCatalog,
}

impl UsageMeter {
    pub fn new(db: Arc<Database>, catalog: PlanCatalog) -> Self {
        Self { db, catalog }
    }

    pub fn catalog(&self) -> &PlanCatalog {
        &self.catalog
    }

    /// Active plan of the user; free tier unless an entitled subscription exists
    pub async fn resolve_plan(&self, user_id: &str) -> Result<Plan> {
        let plan = match self.db.get_subscription(user_id).await? {
            Some(sub) if sub.status.is_entitled() => {
                self.catalog.plan_for_price(&sub.price_id).unwrap_or_else(|| {
                    tracing::warn!(user_id = %user_id, price_id = %sub.price_id, "Unknown price id, using free plan");
                    Plan::Free
                })
            }
            _ => Plan::Free,
        };
        Ok(plan)
    }

    pub async fn check_usage_limit(
        &self,
        user_id: &str,
        metric: UsageMetric,
        increment: u64,
    ) -> Result<UsageCheck> {
        self.check_usage_limit_at(user_id, metric, increment, chrono::Utc::now().timestamp())
            .await
    }

    /// Increment `metric` for the month containing `now` and check the cap
    pub async fn check_usage_limit_at(
        &self,
        user_id: &str,
        metric: UsageMetric,
        increment: u64,
        now: i64,
    ) -> Result<UsageCheck> {
        let increment_sql = sql_increment(increment)?;
        let plan = self.resolve_plan(user_id).await?;
        let limit = self.catalog.limits(plan).get(metric);
        let month = month_key(now);
        let column = metric.column();

        let query = format!(
            r#"
            INSERT INTO usage_counters (user_id, month, {column}, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id, month)
            DO UPDATE SET {column} = {column} + excluded.{column}, updated_at = excluded.updated_at
            RETURNING {column}
            "#
        );

        let current: i64 = sqlx::query_scalar(&query)
            .bind(user_id)
            .bind(&month)
            .bind(increment_sql)
            .bind(now)
            .fetch_one(self.db.pool())
            .await
            .map_err(DbError::SqlxError)?;

        let check = UsageCheck::evaluate(metric, current.max(0) as u64, limit);

        if !check.allowed {
            tracing::info!(
                user_id = %user_id,
                metric = %metric,
                current = check.current,
                limit = %limit,
                "Usage limit reached"
            );
        } else if check.warning {
            tracing::debug!(user_id = %user_id, metric = %metric, "Usage above warning threshold");
        }

        Ok(check)
    }

    pub async fn check_bulk(
        &self,
        user_id: &str,
        increments: &[(UsageMetric, u64)],
    ) -> Result<BulkUsageCheck> {
        self.check_bulk_at(user_id, increments, chrono::Utc::now().timestamp())
            .await
    }

    /// Check several metrics and apply their increments only if all pass
    ///
    /// Runs inside one write transaction: the leading `INSERT OR IGNORE`
    /// takes SQLite's write lock before the counters are read.
    pub async fn check_bulk_at(
        &self,
        user_id: &str,
        increments: &[(UsageMetric, u64)],
        now: i64,
    ) -> Result<BulkUsageCheck> {
        for (_, inc) in increments {
            sql_increment(*inc)?;
        }
        let plan = self.resolve_plan(user_id).await?;
        let limits = self.catalog.limits(plan);
        let month = month_key(now);

        let mut tx = self.db.pool().begin().await.map_err(DbError::SqlxError)?;

        sqlx::query(
            r#"
            INSERT OR IGNORE INTO usage_counters (user_id, month, updated_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(&month)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(DbError::SqlxError)?;

        let counter = fetch_counter(&mut tx, user_id, &month).await?;

        let checks: Vec<UsageCheck> = increments
            .iter()
            .map(|(metric, inc)| {
                UsageCheck::evaluate(
                    *metric,
                    counter.get(*metric).saturating_add(*inc),
                    limits.get(*metric),
                )
            })
            .collect();
        let allowed = checks.iter().all(|c| c.allowed);

        if allowed {
            for (metric, inc) in increments {
                let column = metric.column();
                let query = format!(
                    "UPDATE usage_counters SET {column} = {column} + ?, updated_at = ? WHERE user_id = ? AND month = ?"
                );
                sqlx::query(&query)
                    .bind(sql_increment(*inc)?)
                    .bind(now)
                    .bind(user_id)
                    .bind(&month)
                    .execute(&mut *tx)
                    .await
                    .map_err(DbError::SqlxError)?;
            }
            tx.commit().await.map_err(DbError::SqlxError)?;
        } else {
            tx.rollback().await.map_err(DbError::SqlxError)?;
            tracing::info!(user_id = %user_id, "Bulk usage check rejected");
        }

        Ok(BulkUsageCheck { allowed, checks })
    }

    pub async fn current_usage(&self, user_id: &str) -> Result<UsageSummary> {
        self.current_usage_at(user_id, chrono::Utc::now().timestamp())
            .await
    }

    /// Read-only snapshot of the month containing `now`
    pub async fn current_usage_at(&self, user_id: &str, now: i64) -> Result<UsageSummary> {
        let plan = self.resolve_plan(user_id).await?;
        let limits = self.catalog.limits(plan);
        let month = month_key(now);

        let mut conn = self.db.pool().acquire().await.map_err(DbError::SqlxError)?;
        let counter = fetch_counter(&mut conn, user_id, &month).await?;

        let metrics = UsageMetric::ALL
            .iter()
            .map(|metric| {
                let used = counter.get(*metric);
                let limit = limits.get(*metric);
                MetricUsage {
                    metric: *metric,
                    used,
                    limit,
                    remaining: limit.remaining(used),
                }
            })
            .collect();

        Ok(UsageSummary {
            plan,
            month,
            ai_enabled: limits.ai_enabled,
            metrics,
        })
    }
}

async fn fetch_counter(
    conn: &mut sqlx::SqliteConnection,
    user_id: &str,
    month: &str,
) -> Result<UsageCounter> {
    let row = sqlx::query(
        r#"
        SELECT articles_published, thumbnails_generated, ai_suggestions_used
        FROM usage_counters WHERE user_id = ? AND month = ?
        "#,
    )
    .bind(user_id)
    .bind(month)
    .fetch_optional(&mut *conn)
    .await
    .map_err(DbError::SqlxError)?;

    Ok(match row {
        Some(r) => UsageCounter {
            user_id: user_id.to_string(),
            month: month.to_string(),
            articles_published: r.get::<i64, _>("articles_published").max(0) as u64,
            thumbnails_generated: r.get::<i64, _>("thumbnails_generated").max(0) as u64,
            ai_suggestions_used: r.get::<i64, _>("ai_suggestions_used").max(0) as u64,
        },
        None => UsageCounter {
            user_id: user_id.to_string(),
            month: month.to_string(),
            ..UsageCounter::default()
        },
    })
}

/// Counters are SQLite integers; reject increments they cannot hold
fn sql_increment(increment: u64) -> Result<i64> {
    i64::try_from(increment).map_err(|_| {
        QuillcastError::InvalidInput(format!("Usage increment too large: {}", increment))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlanLimitOverride;
    use crate::types::{BillingSubscription, SubscriptionStatus};
    use tempfile::TempDir;

    // 2025-03-15T12:00:00Z
    const MARCH: i64 = 1_742_040_000;
    // 2025-04-02T12:00:00Z
    const APRIL: i64 = 1_743_595_200;

    async fn setup_meter() -> (TempDir, Arc<Database>, UsageMeter) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Arc::new(Database::new(&db_path.to_string_lossy()).await.unwrap());
        let meter = UsageMeter::new(db.clone(), PlanCatalog::default());
        (temp_dir, db, meter)
    }

    async fn subscribe(db: &Database, user: &str, price: &str, status: SubscriptionStatus) {
        db.upsert_subscription(&BillingSubscription {
            user_id: user.to_string(),
            price_id: price.to_string(),
            status,
            updated_at: 0,
        })
        .await
        .unwrap();
    }

    #[test]
    fn test_limit_display() {
        assert_eq!(Limit::Limited(5).to_string(), "5");
        assert_eq!(Limit::Unlimited.to_string(), "unlimited");
    }

    #[test]
    fn test_warning_threshold_near_u64_max() {
        let cap = Limit::Limited(u64::MAX / 2);
        assert!(cap.warns_at(u64::MAX));
        assert!(!cap.warns_at(1));
        assert!(Limit::Limited(10).warns_at(8));
        assert!(!Limit::Limited(10).warns_at(7));
    }

    #[tokio::test]
    async fn test_oversized_increments_are_rejected() {
        let (_temp, _db, meter) = setup_meter().await;

        let err = meter
            .check_usage_limit_at("user-1", UsageMetric::AiSuggestions, u64::MAX, MARCH)
            .await
            .unwrap_err();
        assert!(matches!(err, QuillcastError::InvalidInput(_)));

        let err = meter
            .check_bulk_at(
                "user-1",
                &[(UsageMetric::ArticlesPublished, 1), (UsageMetric::AiSuggestions, u64::MAX)],
                MARCH,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, QuillcastError::InvalidInput(_)));

        let summary = meter.current_usage_at("user-1", MARCH).await.unwrap();
        assert!(summary.metrics.iter().all(|m| m.used == 0));
    }

    #[test]
    fn test_limit_serializes_as_number_or_unlimited() {
        assert_eq!(serde_json::to_value(Limit::Limited(50)).unwrap(), serde_json::json!(50));
        assert_eq!(
            serde_json::to_value(Limit::Unlimited).unwrap(),
            serde_json::json!("unlimited")
        );
    }

    #[test]
    fn test_warning_threshold() {
        let limit = Limit::Limited(10);
        assert!(!limit.warns_at(7));
        assert!(limit.warns_at(8));
        assert!(!Limit::Unlimited.warns_at(u32::MAX as u64));
    }

    #[test]
    fn test_catalog_overrides() {
        let mut billing = BillingConfig::default();
        billing.plan_limits.insert(
            "free".to_string(),
            PlanLimitOverride {
                thumbnails_generated: Some(0),
                ai_enabled: Some(false),
                ..Default::default()
            },
        );
        billing.plan_limits.insert("platinum".to_string(), PlanLimitOverride::default());
        billing
            .price_plans
            .insert("price_123".to_string(), "business".to_string());

        let catalog = PlanCatalog::from_config(&billing);
        let free = catalog.limits(Plan::Free);
        assert_eq!(free.thumbnails_generated, Limit::Limited(0));
        assert_eq!(free.articles_published, Limit::Limited(5));
        assert!(!free.ai_enabled);
        assert_eq!(catalog.plan_for_price("price_123"), Some(Plan::Business));
        assert_eq!(catalog.plan_for_price("pro"), Some(Plan::Pro));
        assert_eq!(catalog.plan_for_price("price_unknown"), None);
    }

    #[tokio::test]
    async fn test_free_plan_sixth_article_is_rejected() {
        let (_temp, _db, meter) = setup_meter().await;

        for n in 1..=5 {
            let check = meter
                .check_usage_limit_at("user-1", UsageMetric::ArticlesPublished, 1, MARCH)
                .await
                .unwrap();
            assert!(check.allowed, "article {} should be allowed", n);
            assert_eq!(check.current, n);
        }

        let sixth = meter
            .check_usage_limit_at("user-1", UsageMetric::ArticlesPublished, 1, MARCH)
            .await
            .unwrap();
        assert!(!sixth.allowed);
        assert_eq!(sixth.current, 6);
        assert_eq!(sixth.limit, Limit::Limited(5));
        assert_eq!(sixth.remaining, Some(0));
    }

    #[tokio::test]
    async fn test_warning_raised_at_eighty_percent() {
        let (_temp, _db, meter) = setup_meter().await;

        let third = meter
            .check_usage_limit_at("user-1", UsageMetric::ArticlesPublished, 3, MARCH)
            .await
            .unwrap();
        assert!(!third.warning);

        let fourth = meter
            .check_usage_limit_at("user-1", UsageMetric::ArticlesPublished, 1, MARCH)
            .await
            .unwrap();
        assert!(fourth.allowed);
        assert!(fourth.warning);
    }

    #[tokio::test]
    async fn test_month_rollover_resets_counters() {
        let (_temp, _db, meter) = setup_meter().await;

        meter
            .check_usage_limit_at("user-1", UsageMetric::ThumbnailsGenerated, 3, MARCH)
            .await
            .unwrap();
        let april = meter
            .check_usage_limit_at("user-1", UsageMetric::ThumbnailsGenerated, 1, APRIL)
            .await
            .unwrap();
        assert_eq!(april.current, 1);
        assert!(april.allowed);
    }

    #[tokio::test]
    async fn test_business_plan_is_unlimited() {
        let (_temp, db, meter) = setup_meter().await;
        subscribe(&db, "user-1", "business", SubscriptionStatus::Active).await;

        let check = meter
            .check_usage_limit_at("user-1", UsageMetric::ArticlesPublished, 10_000, MARCH)
            .await
            .unwrap();
        assert!(check.allowed);
        assert_eq!(check.limit, Limit::Unlimited);
        assert_eq!(check.remaining, None);
        assert!(!check.warning);
    }

    #[tokio::test]
    async fn test_canceled_subscription_falls_back_to_free() {
        let (_temp, db, meter) = setup_meter().await;
        subscribe(&db, "user-1", "pro", SubscriptionStatus::Canceled).await;
        assert_eq!(meter.resolve_plan("user-1").await.unwrap(), Plan::Free);

        subscribe(&db, "user-1", "pro", SubscriptionStatus::Trialing).await;
        assert_eq!(meter.resolve_plan("user-1").await.unwrap(), Plan::Pro);
    }

    #[tokio::test]
    async fn test_concurrent_single_metric_checks_do_not_lose_increments() {
        let (_temp, db, _meter) = setup_meter().await;
        subscribe(&db, "user-1", "pro", SubscriptionStatus::Active).await;
        let meter = Arc::new(UsageMeter::new(db.clone(), PlanCatalog::default()));

        let mut handles = Vec::new();
        for _ in 0..20 {
            let meter = meter.clone();
            handles.push(tokio::spawn(async move {
                meter
                    .check_usage_limit_at("user-1", UsageMetric::AiSuggestions, 1, MARCH)
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let summary = meter.current_usage_at("user-1", MARCH).await.unwrap();
        let ai = summary
            .metrics
            .iter()
            .find(|m| m.metric == UsageMetric::AiSuggestions)
            .unwrap();
        assert_eq!(ai.used, 20);
    }

    #[tokio::test]
    async fn test_bulk_check_is_all_or_nothing() {
        let (_temp, _db, meter) = setup_meter().await;

        let ok = meter
            .check_bulk_at(
                "user-1",
                &[
                    (UsageMetric::ArticlesPublished, 2),
                    (UsageMetric::ThumbnailsGenerated, 2),
                ],
                MARCH,
            )
            .await
            .unwrap();
        assert!(ok.allowed);

        // Thumbnails would reach 4 of 3, so neither metric moves
        let rejected = meter
            .check_bulk_at(
                "user-1",
                &[
                    (UsageMetric::ArticlesPublished, 1),
                    (UsageMetric::ThumbnailsGenerated, 2),
                ],
                MARCH,
            )
            .await
            .unwrap();
        assert!(!rejected.allowed);
        assert!(rejected.checks[0].allowed);
        assert!(!rejected.checks[1].allowed);

        let summary = meter.current_usage_at("user-1", MARCH).await.unwrap();
        let used: Vec<u64> = summary.metrics.iter().map(|m| m.used).collect();
        assert_eq!(used, vec![2, 2, 0]);
    }

    #[tokio::test]
    async fn test_current_usage_for_new_user() {
        let (_temp, _db, meter) = setup_meter().await;
        let summary = meter.current_usage_at("nobody", MARCH).await.unwrap();

        assert_eq!(summary.plan, Plan::Free);
        assert_eq!(summary.month, "2025-03");
        assert!(summary.metrics.iter().all(|m| m.used == 0));
        assert_eq!(summary.metrics[0].remaining, Some(5));
    }

    #[test]
    fn test_into_result_maps_quota_error() {
        let check = UsageCheck::evaluate(UsageMetric::ArticlesPublished, 6, Limit::Limited(5));
        let err = check.into_result().unwrap_err();
        assert_eq!(err.status_code(), 403);
    }
}
