//! DEV (dev.to) adapter over the Forem REST API

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::error::{PlatformError, Result};
use crate::platforms::{
    error_for_status, AccountInfo, Credentials, PublishContext, PublishedPost, Publisher,
};
use crate::types::Draft;

const DEFAULT_BASE_URL: &str = "https://dev.to";

/// DEV accepts at most four tags per article
const MAX_TAGS: usize = 4;

pub struct DevtoPublisher {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct ArticleRequest<'a> {
    article: ArticleBody<'a>,
}

#[derive(Serialize)]
struct ArticleBody<'a> {
    title: &'a str,
    body_markdown: &'a str,
    published: bool,
    tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    main_image: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    canonical_url: Option<&'a str>,
}

#[derive(Deserialize)]
struct ArticleResponse {
    id: u64,
    url: Option<String>,
}

#[derive(Deserialize)]
struct UserResponse {
    id: u64,
    username: String,
    name: Option<String>,
}

impl DevtoPublisher {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn read_error(&self, response: reqwest::Response) -> PlatformError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        error_for_status(self.display_name(), status, &body)
    }
}

/// DEV tags are lowercase alphanumerics
fn normalize_tag(tag: &str) -> String {
    tag.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}

#[async_trait]
impl Publisher for DevtoPublisher {
    fn name(&self) -> &str {
        "devto"
    }

    fn display_name(&self) -> &str {
        "DEV"
    }

    fn validate(&self, draft: &Draft) -> Result<()> {
        if draft.title.trim().is_empty() {
            return Err(PlatformError::Validation("Title cannot be empty".to_string()).into());
        }
        if draft.content.trim().is_empty() {
            return Err(PlatformError::Validation("Content cannot be empty".to_string()).into());
        }
        if draft.tags.len() > MAX_TAGS {
            return Err(PlatformError::Validation(format!(
                "DEV allows at most {} tags (got {})",
                MAX_TAGS,
                draft.tags.len()
            ))
            .into());
        }
        Ok(())
    }

    async fn validate_credentials(&self, credentials: &Credentials) -> Result<AccountInfo> {
        let response = self
            .client
            .get(format!("{}/api/users/me", self.base_url))
            .header("api-key", credentials.api_key.expose_secret())
            .send()
            .await
            .map_err(PlatformError::from)?;

        if !response.status().is_success() {
            return Err(self.read_error(response).await.into());
        }

        let user: UserResponse = response
            .json()
            .await
            .map_err(|e| PlatformError::Publishing(format!("Unexpected DEV response: {}", e)))?;

        Ok(AccountInfo {
            id: user.id.to_string(),
            username: user.username,
            name: user.name,
        })
    }

    async fn publish(
        &self,
        draft: &Draft,
        credentials: &Credentials,
        context: &PublishContext,
    ) -> Result<PublishedPost> {
        let request = ArticleRequest {
            article: ArticleBody {
                title: &draft.title,
                body_markdown: &draft.content,
                published: !context.publish_as_draft,
                tags: draft.tags.iter().map(|t| normalize_tag(t)).collect(),
                main_image: draft.thumbnail_url.as_deref(),
                canonical_url: context.canonical_url.as_deref(),
            },
        };

        tracing::debug!(draft_id = %draft.id, "Publishing to DEV");

        let response = self
            .client
            .post(format!("{}/api/articles", self.base_url))
            .header("api-key", credentials.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(PlatformError::from)?;

        if !response.status().is_success() {
            return Err(self.read_error(response).await.into());
        }

        let article: ArticleResponse = response
            .json()
            .await
            .map_err(|e| PlatformError::Publishing(format!("Unexpected DEV response: {}", e)))?;

        Ok(PublishedPost {
            platform_post_id: article.id.to_string(),
            url: article.url,
        })
    }
}
