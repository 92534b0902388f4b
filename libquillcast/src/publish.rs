//! Fan-out of a draft to its target platforms
//!
//! Each platform is attempted independently and concurrently; a failure on
//! one platform becomes an error entry in the outcome and never aborts the
//! others. Nothing is retried within a dispatch.

use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{QuillcastError, Result};
use crate::platforms::{Credentials, PublishContext, Publisher, PublisherRegistry};
use crate::types::{Draft, IntegrationStatus, Publication};
use crate::Database;

/// Caller choices for one dispatch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishOptions {
    pub publish_as_draft: bool,
    /// Point cross-posts at the draft's first published URL
    pub use_canonical_url: bool,
    /// Overrides the publication id stored on the integration
    pub publication_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformResult {
    pub platform: String,
    pub success: bool,
    pub platform_post_id: Option<String>,
    pub url: Option<String>,
    pub error: Option<String>,
}

impl PlatformResult {
    fn failed(platform: &str, error: impl Into<String>) -> Self {
        Self {
            platform: platform.to_string(),
            success: false,
            platform_post_id: None,
            url: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub draft_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishOutcome {
    pub draft_id: String,
    pub results: Vec<PlatformResult>,
    pub summary: PublishSummary,
}

impl PublishOutcome {
    fn new(draft_id: &str, results: Vec<PlatformResult>) -> Self {
        let successful = results.iter().filter(|r| r.success).count();
        let summary = PublishSummary {
            total: results.len(),
            successful,
            failed: results.len() - successful,
            draft_id: draft_id.to_string(),
        };
        Self {
            draft_id: draft_id.to_string(),
            results,
            summary,
        }
    }

    /// At least one platform accepted the draft
    pub fn any_succeeded(&self) -> bool {
        self.summary.successful > 0
    }

    /// User-facing summary line
    pub fn message(&self) -> String {
        if self.any_succeeded() {
            return format!(
                "Published to {} of {} platforms",
                self.summary.successful, self.summary.total
            );
        }

        let failures: Vec<String> = self
            .results
            .iter()
            .map(|r| {
                format!(
                    "{}: {}",
                    r.platform,
                    r.error.as_deref().unwrap_or("unknown error")
                )
            })
            .collect();
        format!("Failed to publish: {}", failures.join("; "))
    }

    /// Aggregated error text of the failed platforms
    pub fn error_text(&self) -> Option<String> {
        let errors: Vec<String> = self
            .results
            .iter()
            .filter(|r| !r.success)
            .map(|r| format!("{}: {}", r.platform, r.error.as_deref().unwrap_or("unknown error")))
            .collect();
        (!errors.is_empty()).then(|| errors.join("; "))
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    db: Arc<Database>,
    registry: PublisherRegistry,
}

impl Dispatcher {
    pub fn new(db: Arc<Database>, registry: PublisherRegistry) -> Self {
        Self { db, registry }
    }

    pub fn registry(&self) -> &PublisherRegistry {
        &self.registry
    }

    /// Publish `draft_id` to every platform in `platforms`
    ///
    /// Names are trimmed and deduplicated in first-seen order before
    /// dispatch, so `summary.total` counts distinct platforms and a platform
    /// listed twice is published to once.
    ///
    /// # Errors
    ///
    /// Fails only when `platforms` is empty, the draft does not exist, or
    /// the draft status cannot be updated. Per-platform problems are
    /// reported in the outcome.
    pub async fn dispatch(
        &self,
        draft_id: &str,
        platforms: &[String],
        options: &PublishOptions,
    ) -> Result<PublishOutcome> {
        let mut targets: Vec<&str> = Vec::new();
        for platform in platforms.iter().map(|p| p.trim()) {
            if !platform.is_empty() && !targets.contains(&platform) {
                targets.push(platform);
            }
        }
        if targets.is_empty() {
            return Err(QuillcastError::InvalidInput(
                "At least one platform is required".to_string(),
            ));
        }

        let draft = self
            .db
            .get_draft(draft_id)
            .await?
            .ok_or_else(|| QuillcastError::NotFound(format!("Draft {}", draft_id)))?;

        let canonical_url = if options.use_canonical_url {
            self.canonical_url(draft_id).await?
        } else {
            None
        };

        info!(draft_id = %draft_id, platforms = ?targets, "Dispatching draft");

        let futures = targets.iter().map(|platform| {
            self.publish_one(&draft, platform, options, canonical_url.clone())
        });
        let results = join_all(futures).await;

        let now = chrono::Utc::now().timestamp();
        self.record_results(draft_id, &results, now).await;

        let outcome = PublishOutcome::new(draft_id, results);
        if outcome.any_succeeded() {
            self.db.mark_draft_published(draft_id, now).await?;
        }

        info!(
            draft_id = %draft_id,
            successful = outcome.summary.successful,
            failed = outcome.summary.failed,
            "Dispatch finished"
        );

        Ok(outcome)
    }

    /// URL of the oldest successful publication of the draft
    async fn canonical_url(&self, draft_id: &str) -> Result<Option<String>> {
        let history = self.db.list_publications(draft_id).await?;
        Ok(history
            .iter()
            .rev()
            .find(|p| p.success && p.url.is_some())
            .and_then(|p| p.url.clone()))
    }

    async fn publish_one(
        &self,
        draft: &Draft,
        platform: &str,
        options: &PublishOptions,
        canonical_url: Option<String>,
    ) -> PlatformResult {
        let publisher = match self.registry.get(platform) {
            Some(p) => p,
            None => return PlatformResult::failed(platform, format!("Unsupported platform: {}", platform)),
        };

        let integration = match self.db.get_integration(&draft.user_id, platform).await {
            Ok(Some(integration)) => integration,
            Ok(None) => {
                return PlatformResult::failed(
                    platform,
                    format!("No {} integration connected", publisher.display_name()),
                )
            }
            Err(e) => {
                warn!(platform = %platform, error = %e, "Failed to load integration");
                return PlatformResult::failed(platform, "Failed to load integration");
            }
        };

        if integration.status != IntegrationStatus::Connected {
            return PlatformResult::failed(
                platform,
                format!(
                    "{} integration is {}",
                    publisher.display_name(),
                    integration.status.as_str()
                ),
            );
        }

        let publication_id = options
            .publication_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .or_else(|| integration.publication_id.clone());

        if publisher.requires_publication_id() && publication_id.is_none() {
            return PlatformResult::failed(
                platform,
                format!("Publication ID is required for {}", publisher.display_name()),
            );
        }

        let context = PublishContext {
            publish_as_draft: options.publish_as_draft,
            canonical_url,
            publication_id,
        };

        match send(publisher.as_ref(), draft, &Credentials::from(&integration), &context).await {
            Ok(post) => {
                info!(platform = %platform, post_id = %post.platform_post_id, "Published");
                PlatformResult {
                    platform: platform.to_string(),
                    success: true,
                    platform_post_id: Some(post.platform_post_id),
                    url: post.url,
                    error: None,
                }
            }
            Err(e) => {
                warn!(platform = %platform, error = %e, "Publish failed");
                PlatformResult::failed(platform, platform_message(&e))
            }
        }
    }

    async fn record_results(&self, draft_id: &str, results: &[PlatformResult], now: i64) {
        for result in results {
            let publication = Publication {
                id: None,
                draft_id: draft_id.to_string(),
                platform: result.platform.clone(),
                platform_post_id: result.platform_post_id.clone(),
                url: result.url.clone(),
                success: result.success,
                error_message: result.error.clone(),
                published_at: now,
            };

            if let Err(e) = self.db.create_publication(&publication).await {
                warn!(platform = %result.platform, error = %e, "Failed to record publication");
            }
        }
    }
}

async fn send(
    publisher: &dyn Publisher,
    draft: &Draft,
    credentials: &Credentials,
    context: &PublishContext,
) -> Result<crate::platforms::PublishedPost> {
    publisher.validate(draft)?;
    publisher.publish(draft, credentials, context).await
}

/// Platform errors without the outer wrapper prefix
fn platform_message(error: &QuillcastError) -> String {
    match error {
        QuillcastError::Platform(inner) => inner.to_string(),
        other => other.to_string(),
    }
}
