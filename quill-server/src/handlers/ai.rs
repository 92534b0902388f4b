//! AI suggestion and thumbnail endpoints

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use libquillcast::ai::{AiPurpose, AspectRatio, ImageRequest, ImageSize};
use libquillcast::QuillcastError;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::error::ApiError;
use crate::extract::{client_ip, CurrentUser};
use crate::response::{success, timestamp};
use crate::state::AppState;

/// Provider credentials live on the server only
const CREDENTIAL_FIELDS: &[&str] = &[
    "apiKey",
    "api_key",
    "token",
    "secret",
    "accessToken",
    "credentials",
];

#[derive(Debug, Deserialize)]
pub struct SuggestBody {
    #[serde(default = "default_purpose")]
    pub purpose: AiPurpose,
    pub input: String,
}

fn default_purpose() -> AiPurpose {
    AiPurpose::Suggestion
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThumbnailBody {
    pub prompt: String,
    pub aspect_ratio: AspectRatio,
    pub size: ImageSize,
    pub plan_id: String,
    #[serde(default)]
    pub usage: ReportedUsage,
    #[serde(default = "default_count")]
    pub count: u8,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportedUsage {
    #[serde(default)]
    pub thumbnails_this_month: u64,
}

fn default_count() -> u8 {
    1
}

pub async fn suggest(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<SuggestBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = payload?;
    let text = state.service.suggest(&user, body.purpose, &body.input).await?;
    Ok(success(json!({ "purpose": body.purpose, "text": text })))
}

/// `POST /api/ai/thumbnail`
///
/// Rate limit headers are attached to every response, including errors.
pub async fn thumbnail(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let now = chrono::Utc::now().timestamp();
    let ip = client_ip(&headers);
    let decision = state.thumbnail_limiter.check(&ip, now);
    let rate_headers = [
        ("x-ratelimit-remaining", decision.remaining.to_string()),
        ("x-ratelimit-reset", decision.reset_at.to_string()),
    ];

    if !decision.allowed {
        warn!(client_ip = %ip, "Thumbnail rate limit exceeded");
        let err = ApiError::Service(QuillcastError::RateLimited {
            retry_after_secs: decision.retry_after(now),
        });
        return (rate_headers, err).into_response();
    }

    match generate(&state, payload) {
        Ok(body) => (rate_headers, Json(body)).into_response(),
        Err(err) => (rate_headers, err).into_response(),
    }
}

fn generate(state: &AppState, payload: Result<Json<Value>, JsonRejection>) -> Result<Value, ApiError> {
    let Json(raw) = payload?;

    let fields = raw
        .as_object()
        .ok_or_else(|| ApiError::BadRequest("Request body must be a JSON object".to_string()))?;
    if let Some(field) = CREDENTIAL_FIELDS.iter().find(|f| fields.contains_key(**f)) {
        warn!(field = %field, "Rejected thumbnail request carrying credentials");
        return Err(ApiError::BadRequest(format!(
            "Field '{}' is not accepted: provider credentials are configured on the server",
            field
        )));
    }

    let body: ThumbnailBody = serde_json::from_value(raw)
        .map_err(|e| ApiError::BadRequest(format!("Invalid request: {}", e)))?;

    let request = ImageRequest {
        prompt: body.prompt,
        aspect_ratio: body.aspect_ratio,
        size: body.size,
        count: body.count,
    };
    let result = state.service.generate_thumbnails(
        &body.plan_id,
        body.usage.thumbnails_this_month,
        &request,
    )?;

    Ok(json!({
        "success": true,
        "images": result.images,
        "usage": {
            "thumbnailsThisMonth": result.thumbnails_this_month,
            "limit": result.limit,
        },
        "timestamp": timestamp(),
    }))
}
