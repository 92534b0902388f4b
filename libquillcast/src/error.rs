//! Error types for Quillcast

use thiserror::Error;

use crate::types::UsageMetric;
use crate::usage::Limit;

pub type Result<T> = std::result::Result<T, QuillcastError>;

/// Generic message shown to callers when an upstream provider fails.
pub const PROVIDER_UNAVAILABLE_MESSAGE: &str =
    "AI service is temporarily unavailable. Please try again later.";

#[derive(Error, Debug)]
pub enum QuillcastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("Monthly {} limit reached ({current}/{limit})", metric.label())]
    QuotaExceeded {
        metric: UsageMetric,
        current: u64,
        limit: Limit,
    },

    #[error("Rate limit exceeded, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("{}", PROVIDER_UNAVAILABLE_MESSAGE)]
    ProviderUnavailable,
}

impl QuillcastError {
    /// HTTP status class for this error
    ///
    /// Validation -> 400, authorization -> 401, quota -> 403, rate limits
    /// -> 429, upstream providers -> 503, everything else -> 500.
    pub fn status_code(&self) -> u16 {
        match self {
            QuillcastError::InvalidInput(_) => 400,
            QuillcastError::Platform(PlatformError::Validation(_)) => 400,
            QuillcastError::Unauthorized => 401,
            QuillcastError::Platform(PlatformError::Authentication(_)) => 401,
            QuillcastError::Forbidden(_) => 403,
            QuillcastError::QuotaExceeded { .. } => 403,
            QuillcastError::NotFound(_) => 404,
            QuillcastError::RateLimited { .. } => 429,
            QuillcastError::Platform(PlatformError::RateLimit(_)) => 429,
            QuillcastError::ProviderUnavailable => 503,
            QuillcastError::Platform(_) => 502,
            QuillcastError::Config(_) => 500,
            QuillcastError::Database(_) => 500,
        }
    }

    /// Whether the error message is safe to show to end users verbatim
    pub fn is_user_facing(&self) -> bool {
        !matches!(
            self,
            QuillcastError::Config(_) | QuillcastError::Database(_)
        )
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Corrupt row in {table}: {reason}")]
    CorruptRow { table: &'static str, reason: String },
}

#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Content validation failed: {0}")]
    Validation(String),

    #[error("Publishing failed: {0}")]
    Publishing(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),
}

impl From<reqwest::Error> for PlatformError {
    fn from(err: reqwest::Error) -> Self {
        PlatformError::Network(err.to_string())
    }
}
