//! Service facade for Quillcast
//!
//! `QuillcastService` is the single entry point used by the HTTP server and
//! by tests. It owns the shared resources (database, HTTP client, caches,
//! limiters) and enforces the cross-cutting rules: every operation is
//! scoped to the calling user, and metered actions consume usage before any
//! side effect happens.
//!
//! ```no_run
//! use libquillcast::{Config, QuillcastService};
//! use libquillcast::service::DraftInput;
//!
//! # async fn example() -> libquillcast::Result<()> {
//! let service = QuillcastService::from_config(Config::load()?).await?;
//! let draft = service
//!     .create_draft("user-1", DraftInput::titled("Hello", "First post"))
//!     .await?;
//! let outcome = service
//!     .publish_draft("user-1", &draft.id, Some(vec!["devto".into()]), &Default::default())
//!     .await?;
//! println!("{}", outcome.message());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use chrono::Utc;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::ai::{AiClient, AiPurpose, GeneratedImage, ImageRequest};
use crate::analytics::AnalyticsService;
use crate::config::{resolve_db_path, Config};
use crate::db::QueueStats;
use crate::error::{ConfigError, QuillcastError, Result};
use crate::platforms::{http_client, Credentials, PublisherRegistry};
use crate::publish::{Dispatcher, PublishOptions, PublishOutcome};
use crate::rate_limit::FixedWindowLimiter;
use crate::scheduler::ScheduledPostProcessor;
use crate::scheduling::parse_future_schedule;
use crate::types::{
    AnalyticsEvent, Draft, DraftStatus, Integration, IntegrationSummary, ScheduledPost,
    ScheduledStatus, UsageMetric,
};
use crate::usage::{Limit, Plan, PlanCatalog, UsageMeter, UsageSummary};
use crate::Database;

/// Editable draft fields; absent fields keep their current value on update
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DraftInput {
    pub title: Option<String>,
    pub content: Option<String>,
    pub platforms: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub thumbnail_url: Option<String>,
}

impl DraftInput {
    pub fn titled(title: &str, content: &str) -> Self {
        Self {
            title: Some(title.to_string()),
            content: Some(content.to_string()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectRequest {
    pub platform: String,
    pub api_key: String,
    #[serde(default)]
    pub publication_id: Option<String>,
}

/// Thumbnail generation result with the caller's updated usage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThumbnailResult {
    pub images: Vec<GeneratedImage>,
    pub thumbnails_this_month: u64,
    pub limit: Limit,
}

pub struct QuillcastService {
    db: Arc<Database>,
    config: Arc<Config>,
    usage: UsageMeter,
    dispatcher: Dispatcher,
    processor: Arc<ScheduledPostProcessor>,
    analytics: Arc<AnalyticsService>,
    ai: AiClient,
    thumbnail_limiter: Arc<FixedWindowLimiter>,
}

impl QuillcastService {
    /// Open the configured database and wire the real platform adapters
    pub async fn from_config(config: Config) -> Result<Self> {
        let db_path = resolve_db_path(&config.database.path);
        let db_path_str = db_path.to_str().ok_or_else(|| {
            ConfigError::MissingField("Invalid database path".to_string())
        })?;
        let db = Arc::new(Database::new(db_path_str).await?);

        let client = http_client()?;
        let registry = PublisherRegistry::with_defaults(client.clone());
        Self::from_parts(config, db, registry, client)
    }

    /// Assemble the service from pre-built parts
    pub fn from_parts(
        config: Config,
        db: Arc<Database>,
        registry: PublisherRegistry,
        client: reqwest::Client,
    ) -> Result<Self> {
        let usage = UsageMeter::new(db.clone(), PlanCatalog::from_config(&config.billing));
        let dispatcher = Dispatcher::new(db.clone(), registry);
        let analytics = Arc::new(AnalyticsService::new(
            db.clone(),
            config.analytics.cache_ttl()?,
        ));
        let ai = AiClient::new(&config.ai, client);
        let thumbnail_limiter = Arc::new(FixedWindowLimiter::per_minute(
            config.server.thumbnail_requests_per_minute,
        ));
        let processor = Arc::new(
            ScheduledPostProcessor::new(
                db.clone(),
                dispatcher.clone(),
                config.scheduler.batch_size,
                config.scheduler.max_retries,
            )
            .with_analytics(analytics.clone())
            .with_rate_limiter(ai.limiter())
            .with_rate_limiter(thumbnail_limiter.clone()),
        );

        Ok(Self {
            db,
            config: Arc::new(config),
            usage,
            dispatcher,
            processor,
            analytics,
            ai,
            thumbnail_limiter,
        })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn usage(&self) -> &UsageMeter {
        &self.usage
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn processor(&self) -> Arc<ScheduledPostProcessor> {
        self.processor.clone()
    }

    pub fn analytics(&self) -> &AnalyticsService {
        &self.analytics
    }

    pub fn ai(&self) -> &AiClient {
        &self.ai
    }

    /// Per-client-IP limiter for thumbnail generation
    pub fn thumbnail_limiter(&self) -> Arc<FixedWindowLimiter> {
        self.thumbnail_limiter.clone()
    }

    // ----- drafts -----

    pub async fn create_draft(&self, user_id: &str, input: DraftInput) -> Result<Draft> {
        let title = input.title.unwrap_or_default();
        if title.trim().is_empty() {
            return Err(QuillcastError::InvalidInput("Title cannot be empty".to_string()));
        }

        let mut draft = Draft::new(user_id, title.trim(), input.content.unwrap_or_default());
        draft.platforms = normalize_platforms(input.platforms.unwrap_or_default());
        draft.tags = input.tags.unwrap_or_default();
        draft.thumbnail_url = input.thumbnail_url;

        self.db.create_draft(&draft).await?;
        info!(user_id = %user_id, draft_id = %draft.id, "Draft created");
        Ok(draft)
    }

    /// Load a draft owned by `user_id`
    ///
    /// Drafts of other users are reported as missing.
    pub async fn get_draft(&self, user_id: &str, draft_id: &str) -> Result<Draft> {
        self.db
            .get_draft(draft_id)
            .await?
            .filter(|d| d.user_id == user_id)
            .ok_or_else(|| QuillcastError::NotFound(format!("Draft {}", draft_id)))
    }

    pub async fn list_drafts(&self, user_id: &str, limit: u32) -> Result<Vec<Draft>> {
        self.db.list_drafts(user_id, limit.clamp(1, 500)).await
    }

    pub async fn update_draft(&self, user_id: &str, draft_id: &str, input: DraftInput) -> Result<Draft> {
        let mut draft = self.get_draft(user_id, draft_id).await?;

        if let Some(title) = input.title {
            if title.trim().is_empty() {
                return Err(QuillcastError::InvalidInput("Title cannot be empty".to_string()));
            }
            draft.title = title.trim().to_string();
        }
        if let Some(content) = input.content {
            draft.content = content;
        }
        if let Some(platforms) = input.platforms {
            draft.platforms = normalize_platforms(platforms);
        }
        if let Some(tags) = input.tags {
            draft.tags = tags;
        }
        if input.thumbnail_url.is_some() {
            draft.thumbnail_url = input.thumbnail_url;
        }
        draft.updated_at = Utc::now().timestamp();

        self.db.update_draft(&draft).await?;
        Ok(draft)
    }

    pub async fn delete_draft(&self, user_id: &str, draft_id: &str) -> Result<()> {
        if !self.db.delete_draft(user_id, draft_id).await? {
            return Err(QuillcastError::NotFound(format!("Draft {}", draft_id)));
        }
        info!(user_id = %user_id, draft_id = %draft_id, "Draft deleted");
        Ok(())
    }

    // ----- integrations -----

    /// Validate credentials with the platform and store the integration
    pub async fn connect_integration(&self, user_id: &str, request: ConnectRequest) -> Result<IntegrationSummary> {
        let platform = request.platform.trim().to_lowercase();
        let publisher = self
            .dispatcher
            .registry()
            .get(&platform)
            .ok_or_else(|| QuillcastError::InvalidInput(format!("Unsupported platform: {}", platform)))?;

        if request.api_key.trim().is_empty() {
            return Err(QuillcastError::InvalidInput("API key cannot be empty".to_string()));
        }

        let publication_id = request.publication_id.filter(|id| !id.trim().is_empty());
        let api_key = SecretString::from(request.api_key);
        let credentials = Credentials {
            api_key: api_key.clone(),
            publication_id: publication_id.clone(),
        };

        let account = publisher.validate_credentials(&credentials).await?;

        let mut integration = Integration::new(user_id, &platform, api_key);
        integration.publication_id = publication_id;
        self.db.upsert_integration(&integration).await?;

        info!(
            user_id = %user_id,
            platform = %platform,
            account = %account.username,
            "Integration connected"
        );

        // Re-read so an updated row reports its original id
        let stored = self
            .db
            .get_integration(user_id, &platform)
            .await?
            .unwrap_or(integration);
        Ok(stored.summary())
    }

    pub async fn disconnect_integration(&self, user_id: &str, platform: &str) -> Result<()> {
        if !self.db.delete_integration(user_id, platform).await? {
            return Err(QuillcastError::NotFound(format!("{} integration", platform)));
        }
        info!(user_id = %user_id, platform = %platform, "Integration disconnected");
        Ok(())
    }

    pub async fn list_integrations(&self, user_id: &str) -> Result<Vec<IntegrationSummary>> {
        Ok(self
            .db
            .list_integrations(user_id)
            .await?
            .iter()
            .map(Integration::summary)
            .collect())
    }

    // ----- publishing -----

    /// Publish a draft now, consuming one article from the monthly quota
    ///
    /// `platforms` defaults to the draft's saved platform list. A draft that
    /// is still queued already paid for its article at schedule time; once
    /// any platform succeeds its pending scheduled posts are cancelled.
    pub async fn publish_draft(
        &self,
        user_id: &str,
        draft_id: &str,
        platforms: Option<Vec<String>>,
        options: &PublishOptions,
    ) -> Result<PublishOutcome> {
        let draft = self.get_draft(user_id, draft_id).await?;
        let targets = resolve_targets(&draft, platforms)?;

        let prepaid = self.db.count_pending_for_draft(&draft.id).await? > 0;
        if !prepaid {
            self.usage
                .check_usage_limit(user_id, UsageMetric::ArticlesPublished, 1)
                .await?
                .into_result()?;
        }

        let outcome = self.dispatcher.dispatch(&draft.id, &targets, options).await?;

        if outcome.any_succeeded() {
            let cancelled = self
                .db
                .cancel_pending_for_draft(&draft.id, Utc::now().timestamp())
                .await?;
            if cancelled > 0 {
                info!(draft_id = %draft.id, cancelled, "Cancelled scheduled posts of published draft");
            }
        }

        Ok(outcome)
    }

    /// Queue a draft for later publishing
    ///
    /// `when` accepts anything [`parse_future_schedule`] does. The article
    /// quota is consumed here; the processor never meters.
    pub async fn schedule_draft(
        &self,
        user_id: &str,
        draft_id: &str,
        platforms: Option<Vec<String>>,
        when: &str,
    ) -> Result<ScheduledPost> {
        let now = Utc::now();
        let draft = self.get_draft(user_id, draft_id).await?;
        if draft.status == DraftStatus::Published {
            return Err(QuillcastError::InvalidInput(
                "Draft is already published".to_string(),
            ));
        }
        let targets = resolve_targets(&draft, platforms)?;
        let scheduled_at = parse_future_schedule(when, now)?.timestamp();

        self.usage
            .check_usage_limit(user_id, UsageMetric::ArticlesPublished, 1)
            .await?
            .into_result()?;

        let post = ScheduledPost::new(&draft, targets, scheduled_at);
        self.db.create_scheduled_post(&post).await?;
        self.db
            .mark_draft_scheduled(&draft.id, scheduled_at, now.timestamp())
            .await?;

        info!(
            user_id = %user_id,
            draft_id = %draft.id,
            scheduled_post_id = %post.id,
            scheduled_at,
            "Draft scheduled"
        );
        Ok(post)
    }

    async fn scheduled_post(&self, user_id: &str, id: &str) -> Result<ScheduledPost> {
        self.db
            .get_scheduled_post(id)
            .await?
            .filter(|p| p.user_id == user_id)
            .ok_or_else(|| QuillcastError::NotFound(format!("Scheduled post {}", id)))
    }

    pub async fn cancel_scheduled(&self, user_id: &str, id: &str) -> Result<()> {
        let post = self.scheduled_post(user_id, id).await?;
        let now = Utc::now().timestamp();

        if !self.db.cancel_scheduled_post(user_id, id, now).await? {
            return Err(QuillcastError::InvalidInput(format!(
                "Scheduled post is already {}",
                post.status.as_str()
            )));
        }
        self.db.unschedule_draft(&post.draft_id, now).await?;
        info!(user_id = %user_id, scheduled_post_id = %id, "Scheduled post cancelled");
        Ok(())
    }

    /// Move a pending post to a new time, resetting its retry count
    pub async fn reschedule(&self, user_id: &str, id: &str, when: &str) -> Result<ScheduledPost> {
        let post = self.scheduled_post(user_id, id).await?;
        let now = Utc::now();
        let scheduled_at = parse_future_schedule(when, now)?.timestamp();

        if !self
            .db
            .reschedule_post(user_id, id, scheduled_at, now.timestamp())
            .await?
        {
            return Err(QuillcastError::InvalidInput(format!(
                "Scheduled post is already {}",
                post.status.as_str()
            )));
        }
        self.db
            .mark_draft_scheduled(&post.draft_id, scheduled_at, now.timestamp())
            .await?;

        self.scheduled_post(user_id, id).await
    }

    pub async fn list_scheduled(
        &self,
        user_id: &str,
        status: Option<ScheduledStatus>,
    ) -> Result<Vec<ScheduledPost>> {
        self.db.list_scheduled_posts(user_id, status).await
    }

    pub async fn queue_stats(&self, user_id: &str) -> Result<QueueStats> {
        self.db.queue_stats(user_id).await
    }

    // ----- usage -----

    pub async fn usage_summary(&self, user_id: &str) -> Result<UsageSummary> {
        self.usage.current_usage(user_id).await
    }

    // ----- analytics -----

    /// Record engagement for a draft owned by `user_id`
    pub async fn record_engagement(&self, user_id: &str, event: &AnalyticsEvent) -> Result<i64> {
        self.get_draft(user_id, &event.draft_id).await?;
        self.analytics.record_event(event).await
    }

    // ----- AI -----

    /// AI text generation gated on the plan and the suggestion quota
    pub async fn suggest(&self, user_id: &str, purpose: AiPurpose, input: &str) -> Result<String> {
        let plan = self.usage.resolve_plan(user_id).await?;
        if !self.usage.catalog().limits(plan).ai_enabled {
            return Err(QuillcastError::Forbidden(format!(
                "AI features are not available on the {} plan",
                plan.as_str()
            )));
        }

        self.usage
            .check_usage_limit(user_id, UsageMetric::AiSuggestions, 1)
            .await?
            .into_result()?;

        self.ai.generate_text(user_id, purpose, input).await
    }

    /// Thumbnail generation checked against a client-reported plan and usage
    ///
    /// The caller supplies its plan id and the number of thumbnails already
    /// generated this month; no counter is written here.
    pub fn generate_thumbnails(
        &self,
        plan_id: &str,
        thumbnails_this_month: u64,
        request: &ImageRequest,
    ) -> Result<ThumbnailResult> {
        let plan: Plan = plan_id.parse()?;
        let limits = self.usage.catalog().limits(plan);

        if !limits.ai_enabled {
            return Err(QuillcastError::Forbidden(format!(
                "AI features are not available on the {} plan",
                plan.as_str()
            )));
        }

        let limit = limits.thumbnails_generated;
        if let Limit::Limited(cap) = limit {
            if thumbnails_this_month >= cap {
                return Err(QuillcastError::QuotaExceeded {
                    metric: UsageMetric::ThumbnailsGenerated,
                    current: thumbnails_this_month,
                    limit,
                });
            }
        }

        let images = self.ai.generate_images(request)?;
        Ok(ThumbnailResult {
            images,
            thumbnails_this_month: thumbnails_this_month + 1,
            limit,
        })
    }
}

fn normalize_platforms(platforms: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for platform in platforms {
        let platform = platform.trim().to_lowercase();
        if !platform.is_empty() && !out.contains(&platform) {
            out.push(platform);
        }
    }
    out
}

fn resolve_targets(draft: &Draft, platforms: Option<Vec<String>>) -> Result<Vec<String>> {
    let targets = normalize_platforms(platforms.unwrap_or_else(|| draft.platforms.clone()));
    if targets.is_empty() {
        return Err(QuillcastError::InvalidInput(
            "At least one platform is required".to_string(),
        ));
    }
    Ok(targets)
}
