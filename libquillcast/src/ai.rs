//! Rate-limited wrapper around the hosted text/image generation provider
//!
//! Text goes to an OpenAI-compatible `/chat/completions` endpoint. Image
//! generation is not wired to a provider yet and returns deterministic
//! placeholder URLs. Provider failures never leak upstream details: they are
//! logged here and surface as [`QuillcastError::ProviderUnavailable`].

use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, warn};

use crate::config::AiConfig;
use crate::error::{QuillcastError, Result};
use crate::platforms::truncate;
use crate::rate_limit::FixedWindowLimiter;

/// How much of a failing input is written to the log
const LOGGED_INPUT_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiPurpose {
    Suggestion,
    Rewrite,
    Title,
    Thumbnail,
}

impl AiPurpose {
    /// Longest accepted input, in characters
    pub fn max_input_len(&self) -> usize {
        match self {
            AiPurpose::Suggestion => 2000,
            AiPurpose::Rewrite => 8000,
            AiPurpose::Title => 1000,
            AiPurpose::Thumbnail => 1000,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AiPurpose::Suggestion => "suggestion",
            AiPurpose::Rewrite => "rewrite",
            AiPurpose::Title => "title",
            AiPurpose::Thumbnail => "thumbnail",
        }
    }

    fn validate(&self, input: &str) -> Result<()> {
        if input.trim().is_empty() {
            return Err(QuillcastError::InvalidInput("Input cannot be empty".to_string()));
        }
        let len = input.chars().count();
        if len > self.max_input_len() {
            return Err(QuillcastError::InvalidInput(format!(
                "Input too long for {}: {} characters (max {})",
                self.as_str(),
                len,
                self.max_input_len()
            )));
        }
        Ok(())
    }
}

impl FromStr for AiPurpose {
    type Err = QuillcastError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "suggestion" => Ok(AiPurpose::Suggestion),
            "rewrite" => Ok(AiPurpose::Rewrite),
            "title" => Ok(AiPurpose::Title),
            "thumbnail" => Ok(AiPurpose::Thumbnail),
            other => Err(QuillcastError::InvalidInput(format!("Unknown AI purpose: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "4:3")]
    Standard,
}

impl AspectRatio {
    fn ratio(&self) -> (u32, u32) {
        match self {
            AspectRatio::Square => (1, 1),
            AspectRatio::Landscape => (16, 9),
            AspectRatio::Portrait => (9, 16),
            AspectRatio::Standard => (4, 3),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageSize {
    Small,
    Medium,
    Large,
}

impl ImageSize {
    /// Length of the longer edge in pixels
    fn long_edge(&self) -> u32 {
        match self {
            ImageSize::Small => 512,
            ImageSize::Medium => 1024,
            ImageSize::Large => 1536,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRequest {
    pub prompt: String,
    pub aspect_ratio: AspectRatio,
    pub size: ImageSize,
    pub count: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedImage {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

/// Pixel dimensions for a ratio at a size; the longer edge is fixed
fn dimensions(aspect_ratio: AspectRatio, size: ImageSize) -> (u32, u32) {
    let (w, h) = aspect_ratio.ratio();
    let edge = size.long_edge();
    if w >= h {
        (edge, edge * h / w)
    } else {
        (edge * w / h, edge)
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

pub struct AiClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<SecretString>,
    limiter: Arc<FixedWindowLimiter>,
}

impl AiClient {
    pub fn new(config: &AiConfig, client: reqwest::Client) -> Self {
        Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.active_api_key(),
            limiter: Arc::new(FixedWindowLimiter::per_minute(config.requests_per_minute)),
        }
    }

    /// Per-user request limiter, shared with the scheduler for cleanup
    pub fn limiter(&self) -> Arc<FixedWindowLimiter> {
        self.limiter.clone()
    }

    /// Apply the per-user request limit
    fn admit(&self, user_id: &str) -> Result<()> {
        let now = Utc::now().timestamp();
        let decision = self.limiter.check(user_id, now);
        if !decision.allowed {
            warn!(user_id = %user_id, "AI rate limit exceeded");
            return Err(QuillcastError::RateLimited {
                retry_after_secs: decision.retry_after(now),
            });
        }
        Ok(())
    }

    /// Generate text for `purpose` from `input`
    ///
    /// # Errors
    ///
    /// `InvalidInput` for empty or oversized input, `RateLimited` once the
    /// user exceeds the per-minute budget, `ProviderUnavailable` for any
    /// provider-side failure.
    pub async fn generate_text(&self, user_id: &str, purpose: AiPurpose, input: &str) -> Result<String> {
        purpose.validate(input)?;
        self.admit(user_id)?;

        let Some(api_key) = &self.api_key else {
            error!(purpose = purpose.as_str(), "No AI provider key configured");
            return Err(QuillcastError::ProviderUnavailable);
        };

        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": input }],
        });

        debug!(user_id = %user_id, purpose = purpose.as_str(), "Calling AI provider");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.endpoint))
            .bearer_auth(api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| self.provider_failure(purpose, input, &e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(self.provider_failure(
                purpose,
                input,
                &format!("{}: {}", status, truncate(&detail, 200)),
            ));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| self.provider_failure(purpose, input, &e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| self.provider_failure(purpose, input, "empty completion"))
    }

    fn provider_failure(&self, purpose: AiPurpose, input: &str, detail: &str) -> QuillcastError {
        error!(
            purpose = purpose.as_str(),
            input = %truncate(input, LOGGED_INPUT_CHARS),
            error = %detail,
            "AI provider request failed"
        );
        QuillcastError::ProviderUnavailable
    }

    /// Placeholder image generation
    ///
    /// Identical requests yield identical URLs.
    pub fn generate_images(&self, request: &ImageRequest) -> Result<Vec<GeneratedImage>> {
        AiPurpose::Thumbnail.validate(&request.prompt)?;
        if request.count == 0 || request.count > 4 {
            return Err(QuillcastError::InvalidInput(
                "Image count must be between 1 and 4".to_string(),
            ));
        }

        let (width, height) = dimensions(request.aspect_ratio, request.size);
        let label: String = request
            .prompt
            .split_whitespace()
            .take(4)
            .collect::<Vec<_>>()
            .join("+");

        Ok((1..=request.count)
            .map(|variant| GeneratedImage {
                url: format!(
                    "https://placehold.co/{}x{}/png?text={}&variant={}",
                    width, height, label, variant
                ),
                width,
                height,
            })
            .collect())
    }
}
