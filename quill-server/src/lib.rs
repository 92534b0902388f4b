//! Quillcast HTTP server
//!
//! Exposes the interactive API, the cron trigger for scheduled posts and the
//! AI thumbnail endpoint on top of [`libquillcast::QuillcastService`]. Every
//! JSON response uses the envelope `{success, data|error, timestamp}`.

pub mod error;
pub mod extract;
pub mod handlers;
pub mod response;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
