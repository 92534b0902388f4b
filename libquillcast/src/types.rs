//! Core types for Quillcast

use std::fmt;
use std::str::FromStr;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::QuillcastError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Draft {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub content: String,
    pub status: DraftStatus,
    pub platforms: Vec<String>,
    pub thumbnail_url: Option<String>,
    pub tags: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub published_at: Option<i64>,
    pub scheduled_at: Option<i64>,
}

impl Draft {
    pub fn new(user_id: impl Into<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            title: title.into(),
            content: content.into(),
            status: DraftStatus::Draft,
            platforms: Vec::new(),
            thumbnail_url: None,
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
            published_at: None,
            scheduled_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DraftStatus {
    Draft,
    Scheduled,
    Published,
}

impl DraftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DraftStatus::Draft => "draft",
            DraftStatus::Scheduled => "scheduled",
            DraftStatus::Published => "published",
        }
    }
}

impl FromStr for DraftStatus {
    type Err = QuillcastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(DraftStatus::Draft),
            "scheduled" => Ok(DraftStatus::Scheduled),
            "published" => Ok(DraftStatus::Published),
            other => Err(QuillcastError::InvalidInput(format!(
                "Unknown draft status: {}",
                other
            ))),
        }
    }
}

/// A stored connection between a user and a publishing platform
///
/// Credential material never leaves the `SecretString` wrappers except at
/// the HTTP call site of the platform adapter.
#[derive(Debug, Clone)]
pub struct Integration {
    pub id: String,
    pub user_id: String,
    pub platform: String,
    pub api_key: SecretString,
    pub api_secret: Option<SecretString>,
    pub access_token: Option<SecretString>,
    pub refresh_token: Option<SecretString>,
    pub publication_id: Option<String>,
    pub status: IntegrationStatus,
    pub auto_publish: bool,
    pub sync_interval_minutes: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Integration {
    pub fn new(user_id: impl Into<String>, platform: impl Into<String>, api_key: SecretString) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            platform: platform.into(),
            api_key,
            api_secret: None,
            access_token: None,
            refresh_token: None,
            publication_id: None,
            status: IntegrationStatus::Connected,
            auto_publish: false,
            sync_interval_minutes: 60,
            created_at: now,
            updated_at: now,
        }
    }

    /// Public view of the integration, without credential material
    pub fn summary(&self) -> IntegrationSummary {
        IntegrationSummary {
            id: self.id.clone(),
            platform: self.platform.clone(),
            publication_id: self.publication_id.clone(),
            status: self.status,
            auto_publish: self.auto_publish,
            sync_interval_minutes: self.sync_interval_minutes,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IntegrationSummary {
    pub id: String,
    pub platform: String,
    pub publication_id: Option<String>,
    pub status: IntegrationStatus,
    pub auto_publish: bool,
    pub sync_interval_minutes: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationStatus {
    Connected,
    Disconnected,
    Error,
}

impl IntegrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntegrationStatus::Connected => "connected",
            IntegrationStatus::Disconnected => "disconnected",
            IntegrationStatus::Error => "error",
        }
    }
}

impl FromStr for IntegrationStatus {
    type Err = QuillcastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "connected" => Ok(IntegrationStatus::Connected),
            "disconnected" => Ok(IntegrationStatus::Disconnected),
            "error" => Ok(IntegrationStatus::Error),
            other => Err(QuillcastError::InvalidInput(format!(
                "Unknown integration status: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduledPost {
    pub id: String,
    pub draft_id: String,
    pub user_id: String,
    pub platforms: Vec<String>,
    pub scheduled_at: i64,
    pub status: ScheduledStatus,
    pub retry_count: u32,
    pub last_error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl ScheduledPost {
    pub fn new(draft: &Draft, platforms: Vec<String>, scheduled_at: i64) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: Uuid::new_v4().to_string(),
            draft_id: draft.id.clone(),
            user_id: draft.user_id.clone(),
            platforms,
            scheduled_at,
            status: ScheduledStatus::Pending,
            retry_count: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScheduledStatus {
    Pending,
    Published,
    Cancelled,
    Failed,
}

impl ScheduledStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduledStatus::Pending => "pending",
            ScheduledStatus::Published => "published",
            ScheduledStatus::Cancelled => "cancelled",
            ScheduledStatus::Failed => "failed",
        }
    }

    /// Terminal states are never revisited by the processor
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ScheduledStatus::Pending)
    }
}

impl FromStr for ScheduledStatus {
    type Err = QuillcastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ScheduledStatus::Pending),
            "published" => Ok(ScheduledStatus::Published),
            "cancelled" => Ok(ScheduledStatus::Cancelled),
            "failed" => Ok(ScheduledStatus::Failed),
            other => Err(QuillcastError::InvalidInput(format!(
                "Unknown scheduled post status: {}",
                other
            ))),
        }
    }
}

/// Stored outcome of dispatching one draft to one platform
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Publication {
    pub id: Option<i64>,
    pub draft_id: String,
    pub platform: String,
    pub platform_post_id: Option<String>,
    pub url: Option<String>,
    pub success: bool,
    pub error_message: Option<String>,
    pub published_at: i64,
}

/// A metered quantity tracked per user and month
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UsageMetric {
    ArticlesPublished,
    ThumbnailsGenerated,
    AiSuggestions,
}

impl UsageMetric {
    pub const ALL: [UsageMetric; 3] = [
        UsageMetric::ArticlesPublished,
        UsageMetric::ThumbnailsGenerated,
        UsageMetric::AiSuggestions,
    ];

    /// Column of `usage_counters` holding this metric
    pub fn column(&self) -> &'static str {
        match self {
            UsageMetric::ArticlesPublished => "articles_published",
            UsageMetric::ThumbnailsGenerated => "thumbnails_generated",
            UsageMetric::AiSuggestions => "ai_suggestions_used",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            UsageMetric::ArticlesPublished => "articles published",
            UsageMetric::ThumbnailsGenerated => "thumbnails generated",
            UsageMetric::AiSuggestions => "AI suggestions",
        }
    }
}

impl fmt::Display for UsageMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UsageCounter {
    pub user_id: String,
    pub month: String,
    pub articles_published: u64,
    pub thumbnails_generated: u64,
    pub ai_suggestions_used: u64,
}

impl UsageCounter {
    pub fn get(&self, metric: UsageMetric) -> u64 {
        match metric {
            UsageMetric::ArticlesPublished => self.articles_published,
            UsageMetric::ThumbnailsGenerated => self.thumbnails_generated,
            UsageMetric::AiSuggestions => self.ai_suggestions_used,
        }
    }
}

/// Month key (`YYYY-MM`) for a Unix timestamp
pub fn month_key(timestamp: i64) -> String {
    chrono::DateTime::from_timestamp(timestamp, 0)
        .unwrap_or_else(chrono::Utc::now)
        .format("%Y-%m")
        .to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalyticsEvent {
    pub id: Option<i64>,
    pub draft_id: String,
    pub platform: String,
    pub recorded_at: i64,
    pub reads: i64,
    pub reactions: i64,
    pub clicks: i64,
    pub shares: i64,
}

impl AnalyticsEvent {
    pub fn total_engagement(&self) -> i64 {
        self.reads + self.reactions + self.clicks + self.shares
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BillingSubscription {
    pub user_id: String,
    pub price_id: String,
    pub status: SubscriptionStatus,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Canceled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
        }
    }

    /// Whether the subscription entitles the user to its plan
    pub fn is_entitled(&self) -> bool {
        matches!(self, SubscriptionStatus::Active | SubscriptionStatus::Trialing)
    }
}

impl FromStr for SubscriptionStatus {
    type Err = QuillcastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SubscriptionStatus::Active),
            "trialing" => Ok(SubscriptionStatus::Trialing),
            "past_due" => Ok(SubscriptionStatus::PastDue),
            "canceled" => Ok(SubscriptionStatus::Canceled),
            other => Err(QuillcastError::InvalidInput(format!(
                "Unknown subscription status: {}",
                other
            ))),
        }
    }
}
