//! Cron trigger for the scheduled-post processor

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{error, warn};

use crate::error::ApiError;
use crate::response::{success, timestamp};
use crate::state::AppState;

/// `GET|POST /api/cron/scheduled-posts`
///
/// Runs one sweep. With a configured secret the request must carry exactly
/// `Authorization: Bearer <secret>`; anything else is rejected before the
/// database is touched.
pub async fn scheduled_posts(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(secret) = &state.cron_secret {
        let expected = format!("Bearer {}", secret);
        let provided = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        if provided != Some(expected.as_str()) {
            warn!("Rejected cron request with invalid secret");
            return ApiError::Unauthorized.into_response();
        }
    }

    match state.service.processor().sweep(chrono::Utc::now().timestamp()).await {
        Ok(report) => success(report).into_response(),
        Err(e) => {
            error!(error = %e, "Scheduled post sweep failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "error": "Failed to process scheduled posts",
                    "timestamp": timestamp(),
                })),
            )
                .into_response()
        }
    }
}
