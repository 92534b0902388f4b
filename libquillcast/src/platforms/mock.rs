//! Configurable in-process publisher
//!
//! Simulates success, failure, transient failure and latency so dispatch
//! and scheduling logic can be exercised without network access.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;

use crate::error::{PlatformError, Result};
use crate::platforms::{AccountInfo, Credentials, PublishContext, PublishedPost, Publisher};
use crate::types::Draft;

#[derive(Debug, Clone)]
pub struct MockConfig {
    pub name: String,
    pub display_name: String,
    pub requires_publication_id: bool,
    /// Error returned by every publish call, when set
    pub publish_error: Option<PlatformError>,
    /// Number of leading publish calls that fail before the mock recovers
    pub transient_failures: usize,
    pub credentials_valid: bool,
    pub delay: Duration,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            display_name: "Mock".to_string(),
            requires_publication_id: false,
            publish_error: None,
            transient_failures: 0,
            credentials_valid: true,
            delay: Duration::ZERO,
        }
    }
}

pub struct MockPublisher {
    config: MockConfig,
    publish_calls: AtomicUsize,
    published: Mutex<Vec<(String, PublishContext)>>,
}

impl MockPublisher {
    pub fn new(config: MockConfig) -> Self {
        Self {
            config,
            publish_calls: AtomicUsize::new(0),
            published: Mutex::new(Vec::new()),
        }
    }

    pub fn success(name: &str) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            display_name: name.to_string(),
            ..Default::default()
        })
    }

    pub fn failure(name: &str, error: &str) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            display_name: name.to_string(),
            publish_error: Some(PlatformError::Publishing(error.to_string())),
            ..Default::default()
        })
    }

    /// Fails the first `times` publish calls, then succeeds
    pub fn flaky(name: &str, times: usize) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            display_name: name.to_string(),
            transient_failures: times,
            ..Default::default()
        })
    }

    pub fn with_delay(name: &str, delay: Duration) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            display_name: name.to_string(),
            delay,
            ..Default::default()
        })
    }

    pub fn requiring_publication_id(mut self, display_name: &str) -> Self {
        self.config.requires_publication_id = true;
        self.config.display_name = display_name.to_string();
        self
    }

    pub fn with_invalid_credentials(mut self) -> Self {
        self.config.credentials_valid = false;
        self
    }

    pub fn publish_call_count(&self) -> usize {
        self.publish_calls.load(Ordering::SeqCst)
    }

    /// Titles of successfully published drafts, in call order
    pub fn published_titles(&self) -> Vec<String> {
        self.published
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(title, _)| title.clone())
            .collect()
    }

    pub fn last_context(&self) -> Option<PublishContext> {
        self.published
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .map(|(_, ctx)| ctx.clone())
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn display_name(&self) -> &str {
        &self.config.display_name
    }

    fn requires_publication_id(&self) -> bool {
        self.config.requires_publication_id
    }

    async fn validate_credentials(&self, _credentials: &Credentials) -> Result<AccountInfo> {
        if !self.config.credentials_valid {
            return Err(PlatformError::Authentication("Mock credentials rejected".to_string()).into());
        }
        Ok(AccountInfo {
            id: format!("{}-account", self.config.name),
            username: "mock-user".to_string(),
            name: None,
        })
    }

    async fn publish(
        &self,
        draft: &Draft,
        _credentials: &Credentials,
        context: &PublishContext,
    ) -> Result<PublishedPost> {
        let call = self.publish_calls.fetch_add(1, Ordering::SeqCst);

        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }

        if let Some(err) = &self.config.publish_error {
            return Err(err.clone().into());
        }
        if call < self.config.transient_failures {
            return Err(PlatformError::Network("Mock transient failure".to_string()).into());
        }

        self.published
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((draft.title.clone(), context.clone()));

        let post_id = format!("{}-{}", self.config.name, uuid::Uuid::new_v4());
        Ok(PublishedPost {
            url: Some(format!("https://{}.example/posts/{}", self.config.name, post_id)),
            platform_post_id: post_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn creds() -> Credentials {
        Credentials {
            api_key: SecretString::from("k"),
            publication_id: None,
        }
    }

    #[tokio::test]
    async fn test_mock_success() {
        let publisher = MockPublisher::success("devto");
        let draft = Draft::new("u", "Hello", "Body");

        let post = publisher
            .publish(&draft, &creds(), &PublishContext::default())
            .await
            .unwrap();
        assert!(post.platform_post_id.starts_with("devto-"));
        assert_eq!(publisher.publish_call_count(), 1);
        assert_eq!(publisher.published_titles(), vec!["Hello"]);
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let publisher = MockPublisher::failure("devto", "Service down");
        let draft = Draft::new("u", "Hello", "Body");

        let err = publisher
            .publish(&draft, &creds(), &PublishContext::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Service down"));
        assert_eq!(publisher.publish_call_count(), 1);
        assert!(publisher.published_titles().is_empty());
    }

    #[tokio::test]
    async fn test_mock_flaky_recovers() {
        let publisher = MockPublisher::flaky("devto", 2);
        let draft = Draft::new("u", "Hello", "Body");
        let ctx = PublishContext::default();

        assert!(publisher.publish(&draft, &creds(), &ctx).await.is_err());
        assert!(publisher.publish(&draft, &creds(), &ctx).await.is_err());
        assert!(publisher.publish(&draft, &creds(), &ctx).await.is_ok());
    }

    #[tokio::test]
    async fn test_mock_records_context() {
        let publisher = MockPublisher::success("hashnode").requiring_publication_id("Hashnode");
        assert!(publisher.requires_publication_id());
        assert_eq!(publisher.display_name(), "Hashnode");

        let ctx = PublishContext {
            publish_as_draft: true,
            canonical_url: None,
            publication_id: Some("pub-1".to_string()),
        };
        publisher
            .publish(&Draft::new("u", "T", "B"), &creds(), &ctx)
            .await
            .unwrap();
        assert_eq!(publisher.last_context(), Some(ctx));
    }

    #[tokio::test]
    async fn test_mock_invalid_credentials() {
        let publisher = MockPublisher::success("devto").with_invalid_credentials();
        assert!(publisher.validate_credentials(&creds()).await.is_err());
    }
}
