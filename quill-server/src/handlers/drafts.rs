//! Draft CRUD, publish and schedule

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;
use libquillcast::service::DraftInput;
use libquillcast::PublishOptions;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::extract::CurrentUser;
use crate::response::success;
use crate::state::AppState;

type ApiResult = Result<Json<Value>, ApiError>;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PublishBody {
    /// Defaults to the draft's saved platforms
    pub platforms: Option<Vec<String>>,
    #[serde(flatten)]
    pub options: PublishOptions,
}

#[derive(Debug, Deserialize)]
pub struct ScheduleBody {
    #[serde(default)]
    pub platforms: Option<Vec<String>>,
    /// RFC 3339, unix seconds, a duration such as `2h`, or natural language
    pub when: String,
}

pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<DraftInput>, JsonRejection>,
) -> ApiResult {
    let Json(input) = payload?;
    let draft = state.service.create_draft(&user, input).await?;
    Ok(success(draft))
}

pub async fn list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    params: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult {
    let Query(params) = params?;
    let drafts = state
        .service
        .list_drafts(&user, params.limit.unwrap_or(50))
        .await?;
    Ok(success(drafts))
}

pub async fn get(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult {
    Ok(success(state.service.get_draft(&user, &id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    payload: Result<Json<DraftInput>, JsonRejection>,
) -> ApiResult {
    let Json(input) = payload?;
    Ok(success(state.service.update_draft(&user, &id, input).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult {
    state.service.delete_draft(&user, &id).await?;
    Ok(success(json!({ "id": id, "deleted": true })))
}

/// Partial success is still a 200; per-platform errors live in `data.results`
pub async fn publish(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    payload: Result<Json<PublishBody>, JsonRejection>,
) -> ApiResult {
    let Json(body) = payload?;
    let outcome = state
        .service
        .publish_draft(&user, &id, body.platforms, &body.options)
        .await?;

    Ok(success(json!({
        "message": outcome.message(),
        "outcome": outcome,
    })))
}

pub async fn schedule(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    payload: Result<Json<ScheduleBody>, JsonRejection>,
) -> ApiResult {
    let Json(body) = payload?;
    let post = state
        .service
        .schedule_draft(&user, &id, body.platforms, &body.when)
        .await?;
    Ok(success(post))
}
