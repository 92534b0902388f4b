//! API error type and its JSON envelope

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use libquillcast::QuillcastError;
use serde_json::{json, Value};

use crate::response::timestamp;

const INTERNAL_MESSAGE: &str = "An internal error occurred";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing caller identity or bad cron secret
    #[error("Unauthorized")]
    Unauthorized,

    /// Malformed request that never reached the service
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Service(#[from] QuillcastError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Service(e) => {
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = match &self {
            ApiError::Service(e) if !e.is_user_facing() => {
                tracing::error!(error = %e, "Internal error");
                INTERNAL_MESSAGE.to_string()
            }
            other => other.to_string(),
        };

        let mut body: Value = json!({
            "success": false,
            "error": message,
            "timestamp": timestamp(),
        });

        let mut retry_after = None;
        match &self {
            ApiError::Service(QuillcastError::QuotaExceeded {
                metric,
                current,
                limit,
            }) => {
                body["metric"] = json!(metric);
                body["current"] = json!(current);
                body["limit"] = json!(limit);
            }
            ApiError::Service(QuillcastError::RateLimited { retry_after_secs }) => {
                retry_after = Some(*retry_after_secs);
            }
            _ => {}
        }

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}
