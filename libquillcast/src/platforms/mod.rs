//! Publishing platform adapters
//!
//! Each adapter turns a [`Draft`] into a post on one platform. Adapters are
//! looked up by their lowercase identifier (`devto`, `hashnode`) through a
//! [`PublisherRegistry`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::Serialize;

use crate::error::{PlatformError, Result};
use crate::types::{Draft, Integration};

pub mod devto;
pub mod hashnode;

// Available outside tests so integration tests and local runs can dispatch offline
pub mod mock;

/// Credential material an adapter needs for one call
#[derive(Debug, Clone)]
pub struct Credentials {
    pub api_key: SecretString,
    pub publication_id: Option<String>,
}

impl From<&Integration> for Credentials {
    fn from(integration: &Integration) -> Self {
        Self {
            api_key: integration.api_key.clone(),
            publication_id: integration.publication_id.clone(),
        }
    }
}

/// Per-call publishing choices, resolved by the dispatcher
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishContext {
    pub publish_as_draft: bool,
    pub canonical_url: Option<String>,
    /// Publication to post into; already checked for platforms that need one
    pub publication_id: Option<String>,
}

/// Account behind a set of credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountInfo {
    pub id: String,
    pub username: String,
    pub name: Option<String>,
}

/// What a platform returned for a successful publish
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedPost {
    pub platform_post_id: String,
    pub url: Option<String>,
}

#[async_trait]
pub trait Publisher: Send + Sync {
    /// Lowercase identifier, also the `integrations.platform` value
    fn name(&self) -> &str;

    /// Human-facing platform name used in messages
    fn display_name(&self) -> &str;

    /// Whether posts must target a publication id
    fn requires_publication_id(&self) -> bool {
        false
    }

    /// Platform-specific checks before any network call
    fn validate(&self, draft: &Draft) -> Result<()> {
        if draft.title.trim().is_empty() {
            return Err(PlatformError::Validation("Title cannot be empty".to_string()).into());
        }
        if draft.content.trim().is_empty() {
            return Err(PlatformError::Validation("Content cannot be empty".to_string()).into());
        }
        Ok(())
    }

    /// Check credentials and return the account they belong to
    async fn validate_credentials(&self, credentials: &Credentials) -> Result<AccountInfo>;

    async fn publish(
        &self,
        draft: &Draft,
        credentials: &Credentials,
        context: &PublishContext,
    ) -> Result<PublishedPost>;
}

/// Adapters available to the dispatcher, keyed by [`Publisher::name`]
#[derive(Clone, Default)]
pub struct PublisherRegistry {
    publishers: HashMap<String, Arc<dyn Publisher>>,
}

impl PublisherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the real network adapters
    pub fn with_defaults(client: reqwest::Client) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(devto::DevtoPublisher::new(client.clone())));
        registry.register(Arc::new(hashnode::HashnodePublisher::new(client)));
        registry
    }

    /// Add or replace the adapter for its name
    pub fn register(&mut self, publisher: Arc<dyn Publisher>) {
        self.publishers
            .insert(publisher.name().to_string(), publisher);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Publisher>> {
        self.publishers.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.publishers.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Shared HTTP client for platform adapters
pub fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .user_agent(concat!("quillcast/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| PlatformError::Network(format!("Failed to build HTTP client: {}", e)).into())
}

/// Map a non-success HTTP status to the platform error class
pub(crate) fn error_for_status(platform: &str, status: reqwest::StatusCode, body: &str) -> PlatformError {
    let detail = if body.trim().is_empty() {
        format!("{} returned {}", platform, status)
    } else {
        format!("{} returned {}: {}", platform, status, truncate(body, 200))
    };

    match status.as_u16() {
        401 | 403 => PlatformError::Authentication(detail),
        400 | 422 => PlatformError::Validation(detail),
        429 => PlatformError::RateLimit(detail),
        _ => PlatformError::Publishing(detail),
    }
}

pub(crate) fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
