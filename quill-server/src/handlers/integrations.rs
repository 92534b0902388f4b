use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use libquillcast::service::ConnectRequest;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::extract::CurrentUser;
use crate::response::success;
use crate::state::AppState;

/// Validates the credentials with the platform before storing them
pub async fn connect(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<ConnectRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    Ok(success(state.service.connect_integration(&user, request).await?))
}

pub async fn list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Value>, ApiError> {
    Ok(success(state.service.list_integrations(&user).await?))
}

pub async fn disconnect(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(platform): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.service.disconnect_integration(&user, &platform).await?;
    Ok(success(json!({ "platform": platform, "connected": false })))
}
