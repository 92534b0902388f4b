//! Hashnode adapter over the public GraphQL API
//!
//! Posts always target a publication, so the dispatcher must resolve a
//! publication id before calling [`HashnodePublisher::publish`].

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{PlatformError, Result};
use crate::platforms::{
    error_for_status, AccountInfo, Credentials, PublishContext, PublishedPost, Publisher,
};
use crate::types::Draft;

const DEFAULT_ENDPOINT: &str = "https://gql.hashnode.com";

const PUBLISH_POST: &str = r#"
mutation PublishPost($input: PublishPostInput!) {
  publishPost(input: $input) { post { id url } }
}
"#;

const CREATE_DRAFT: &str = r#"
mutation CreateDraft($input: CreateDraftInput!) {
  createDraft(input: $input) { draft { id } }
}
"#;

const ME: &str = "query Me { me { id username name } }";

pub struct HashnodePublisher {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Deserialize)]
struct GraphQlResponse {
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
    #[serde(default)]
    extensions: Option<Value>,
}

impl HashnodePublisher {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_endpoint(client, DEFAULT_ENDPOINT)
    }

    pub fn with_endpoint(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        }
    }

    async fn execute(&self, token: &str, query: &str, variables: Value) -> Result<Value> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", token)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .map_err(PlatformError::from)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_for_status(self.display_name(), status, &body).into());
        }

        let body: GraphQlResponse = response
            .json()
            .await
            .map_err(|e| PlatformError::Publishing(format!("Unexpected Hashnode response: {}", e)))?;

        if let Some(first) = body.errors.first() {
            return Err(graphql_error(first).into());
        }

        body.data
            .ok_or_else(|| PlatformError::Publishing("Hashnode returned no data".to_string()).into())
    }
}

fn graphql_error(error: &GraphQlError) -> PlatformError {
    let code = error
        .extensions
        .as_ref()
        .and_then(|ext| ext.get("code"))
        .and_then(Value::as_str)
        .unwrap_or_default();

    let message = format!("Hashnode: {}", error.message);
    match code {
        "UNAUTHENTICATED" | "FORBIDDEN" => PlatformError::Authentication(message),
        "BAD_USER_INPUT" | "GRAPHQL_VALIDATION_FAILED" => PlatformError::Validation(message),
        _ => PlatformError::Publishing(message),
    }
}

/// Hashnode tag slugs: lowercase words joined by dashes
fn tag_slug(tag: &str) -> String {
    tag.to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

fn str_at<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value.pointer(pointer).and_then(Value::as_str)
}

#[async_trait]
impl Publisher for HashnodePublisher {
    fn name(&self) -> &str {
        "hashnode"
    }

    fn display_name(&self) -> &str {
        "Hashnode"
    }

    fn requires_publication_id(&self) -> bool {
        true
    }

    async fn validate_credentials(&self, credentials: &Credentials) -> Result<AccountInfo> {
        let data = self
            .execute(credentials.api_key.expose_secret(), ME, json!({}))
            .await?;

        let me = data
            .get("me")
            .filter(|v| !v.is_null())
            .ok_or_else(|| PlatformError::Authentication("Hashnode token rejected".to_string()))?;

        Ok(AccountInfo {
            id: str_at(me, "/id").unwrap_or_default().to_string(),
            username: str_at(me, "/username").unwrap_or_default().to_string(),
            name: str_at(me, "/name").map(str::to_string),
        })
    }

    async fn publish(
        &self,
        draft: &Draft,
        credentials: &Credentials,
        context: &PublishContext,
    ) -> Result<PublishedPost> {
        let publication_id = context.publication_id.as_deref().ok_or_else(|| {
            PlatformError::Validation("Publication ID is required for Hashnode".to_string())
        })?;

        let tags: Vec<Value> = draft
            .tags
            .iter()
            .map(|t| json!({ "slug": tag_slug(t), "name": t }))
            .collect();

        let mut input = json!({
            "title": draft.title,
            "contentMarkdown": draft.content,
            "publicationId": publication_id,
            "tags": tags,
        });
        if let Some(cover) = &draft.thumbnail_url {
            input["coverImageOptions"] = json!({ "coverImageURL": cover });
        }
        if let Some(canonical) = &context.canonical_url {
            input["originalArticleURL"] = json!(canonical);
        }

        tracing::debug!(draft_id = %draft.id, as_draft = context.publish_as_draft, "Publishing to Hashnode");

        let token = credentials.api_key.expose_secret();
        if context.publish_as_draft {
            let data = self
                .execute(token, CREATE_DRAFT, json!({ "input": input }))
                .await?;
            let id = str_at(&data, "/createDraft/draft/id").ok_or_else(|| {
                PlatformError::Publishing("Hashnode did not return a draft id".to_string())
            })?;
            return Ok(PublishedPost {
                platform_post_id: id.to_string(),
                url: None,
            });
        }

        let data = self
            .execute(token, PUBLISH_POST, json!({ "input": input }))
            .await?;
        let id = str_at(&data, "/publishPost/post/id").ok_or_else(|| {
            PlatformError::Publishing("Hashnode did not return a post id".to_string())
        })?;

        Ok(PublishedPost {
            platform_post_id: id.to_string(),
            url: str_at(&data, "/publishPost/post/url").map(str::to_string),
        })
    }
}
