//! Analytics views and event ingestion

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;
use libquillcast::analytics::{AnalyticsView, DateRange, Granularity};
use libquillcast::types::AnalyticsEvent;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::extract::CurrentUser;
use crate::response::success;
use crate::state::AppState;

/// Window used when the caller gives no `from`
const DEFAULT_RANGE_DAYS: i64 = 30;

#[derive(Debug, Deserialize)]
pub struct ViewParams {
    pub from: Option<i64>,
    pub to: Option<i64>,
    pub granularity: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct EventBody {
    pub draft_id: String,
    pub platform: String,
    /// Defaults to now
    pub recorded_at: Option<i64>,
    #[serde(default)]
    pub reads: i64,
    #[serde(default)]
    pub reactions: i64,
    #[serde(default)]
    pub clicks: i64,
    #[serde(default)]
    pub shares: i64,
}

/// `GET /api/analytics/:view` where view is `overview`, `timeseries`,
/// `platforms` or `top-posts`
pub async fn view(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(name): Path<String>,
    params: Result<Query<ViewParams>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(params) = params?;
    let now = chrono::Utc::now().timestamp();

    let to = params.to.unwrap_or(now);
    let range = match params.from {
        Some(from) => DateRange::new(from, to)?,
        None => DateRange::last_days(to, DEFAULT_RANGE_DAYS),
    };
    let granularity = params
        .granularity
        .as_deref()
        .map(str::parse::<Granularity>)
        .transpose()?;
    let limit = params
        .limit
        .unwrap_or(state.service.config().analytics.top_posts_limit)
        .clamp(1, 100);

    let view = AnalyticsView::parse(&name, granularity, limit)?;
    let data = state.service.analytics().view(&user, view, range).await?;

    Ok(success(json!({
        "view": name,
        "range": range,
        "result": data,
    })))
}

pub async fn record(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<EventBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = payload?;
    let event = AnalyticsEvent {
        id: None,
        draft_id: body.draft_id,
        platform: body.platform,
        recorded_at: body.recorded_at.unwrap_or_else(|| chrono::Utc::now().timestamp()),
        reads: body.reads,
        reactions: body.reactions,
        clicks: body.clicks,
        shares: body.shares,
    };

    let id = state.service.record_engagement(&user, &event).await?;
    Ok(success(json!({ "id": id })))
}
