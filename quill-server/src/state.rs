//! Shared handler state

use std::sync::Arc;

use libquillcast::rate_limit::FixedWindowLimiter;
use libquillcast::QuillcastService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<QuillcastService>,
    /// Bearer secret for the cron endpoint; open when unset
    pub cron_secret: Option<String>,
    /// Per-IP limiter for the thumbnail endpoint, swept by the scheduler tick
    pub thumbnail_limiter: Arc<FixedWindowLimiter>,
}

impl AppState {
    pub fn new(service: Arc<QuillcastService>) -> Self {
        let server = &service.config().server;
        let cron_secret = server.cron_secret.clone().filter(|s| !s.is_empty());
        if cron_secret.is_none() {
            tracing::warn!("CRON_SECRET not set - cron endpoint is open");
        }
        let thumbnail_limiter = service.thumbnail_limiter();

        Self {
            service,
            cron_secret,
            thumbnail_limiter,
        }
    }
}
