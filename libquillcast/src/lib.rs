//! Quillcast - write once, publish everywhere
//!
//! This library provides the backend of the Quillcast authoring tool:
//! persistence, plan-based usage metering, multi-platform publishing,
//! the scheduled-post processor, analytics rollups and the AI provider
//! wrapper.

pub mod ai;
pub mod analytics;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod platforms;
pub mod publish;
pub mod rate_limit;
pub mod scheduler;
pub mod scheduling;
pub mod service;
pub mod types;
pub mod usage;

// Re-export commonly used types
pub use config::Config;
pub use db::Database;
pub use error::{QuillcastError, Result};
pub use publish::{Dispatcher, PublishOptions, PublishOutcome};
pub use service::QuillcastService;
pub use types::{Draft, DraftStatus, Integration, ScheduledPost, ScheduledStatus, UsageMetric};
