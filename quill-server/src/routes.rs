//! Router configuration

use axum::routing::{get, post, put};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{ai, analytics, cron, drafts, health, integrations, scheduled, usage};
use crate::state::AppState;

/// Largest accepted request body (draft content included)
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// In-flight requests allowed against the AI provider
const AI_MAX_CONCURRENT_REQUESTS: usize = 16;

/// Build the router with all routes and middleware
///
/// # Routes
///
/// ## Public
/// - `GET /health`
/// - `GET|POST /api/cron/scheduled-posts` (bearer secret when configured)
/// - `POST /api/ai/thumbnail` (rate limited per client IP)
///
/// ## Per user (`x-user-id`)
/// - `/api/drafts`, `/api/drafts/:id`, `/api/drafts/:id/publish`, `/api/drafts/:id/schedule`
/// - `/api/scheduled`, `/api/scheduled/stats`, `/api/scheduled/:id`
/// - `/api/integrations`, `/api/integrations/:platform`
/// - `/api/usage`
/// - `/api/analytics/events`, `/api/analytics/:view`
/// - `/api/ai/suggest`
pub fn create_router(state: AppState) -> Router {
    let ai_routes = Router::new()
        .route("/api/ai/suggest", post(ai::suggest))
        .route("/api/ai/thumbnail", post(ai::thumbnail))
        .layer(ConcurrencyLimitLayer::new(AI_MAX_CONCURRENT_REQUESTS));

    Router::new()
        .route("/health", get(health::health))
        // Cron trigger
        .route(
            "/api/cron/scheduled-posts",
            get(cron::scheduled_posts).post(cron::scheduled_posts),
        )
        // Drafts
        .route("/api/drafts", post(drafts::create).get(drafts::list))
        .route(
            "/api/drafts/:id",
            get(drafts::get).put(drafts::update).delete(drafts::delete),
        )
        .route("/api/drafts/:id/publish", post(drafts::publish))
        .route("/api/drafts/:id/schedule", post(drafts::schedule))
        // Scheduled posts
        .route("/api/scheduled", get(scheduled::list))
        .route("/api/scheduled/stats", get(scheduled::stats))
        .route(
            "/api/scheduled/:id",
            put(scheduled::reschedule).delete(scheduled::cancel),
        )
        // Integrations
        .route(
            "/api/integrations",
            post(integrations::connect).get(integrations::list),
        )
        .route(
            "/api/integrations/:platform",
            axum::routing::delete(integrations::disconnect),
        )
        // Usage and analytics
        .route("/api/usage", get(usage::summary))
        .route("/api/analytics/events", post(analytics::record))
        .route("/api/analytics/:view", get(analytics::view))
        .merge(ai_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}
