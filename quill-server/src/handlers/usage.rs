use axum::extract::State;
use axum::Json;
use serde_json::Value;

use crate::error::ApiError;
use crate::extract::CurrentUser;
use crate::response::success;
use crate::state::AppState;

/// Current month's usage against the plan caps
pub async fn summary(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Value>, ApiError> {
    Ok(success(state.service.usage_summary(&user).await?))
}
