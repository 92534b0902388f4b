//! Configuration management for Quillcast
//!
//! Configuration is read from a TOML file and then overlaid with
//! environment variables, so a deployment can keep secrets out of the file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub billing: BillingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "~/.local/share/quillcast/quillcast.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Shared secret for the cron endpoint; `None` leaves it open
    #[serde(default)]
    pub cron_secret: Option<String>,
    pub thumbnail_requests_per_minute: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            cron_secret: None,
            thumbnail_requests_per_minute: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub enabled: bool,
    /// How often the internal timer sweeps (humantime, e.g. "60s")
    pub poll_interval: String,
    pub batch_size: u32,
    pub max_retries: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval: "60s".to_string(),
            batch_size: 10,
            max_retries: 3,
        }
    }
}

impl SchedulerConfig {
    pub fn poll_interval(&self) -> Result<Duration> {
        parse_duration_field("scheduler.poll_interval", &self.poll_interval)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    pub cache_ttl: String,
    pub top_posts_limit: u32,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            cache_ttl: "2m".to_string(),
            top_posts_limit: 10,
        }
    }
}

impl AnalyticsConfig {
    pub fn cache_ttl(&self) -> Result<Duration> {
        parse_duration_field("analytics.cache_ttl", &self.cache_ttl)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentMode {
    /// Managed deployment using the operator's shared provider key
    Hosted,
    /// Self-hosted instance bringing its own provider key
    SelfHosted,
}

impl std::str::FromStr for DeploymentMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "hosted" => Ok(DeploymentMode::Hosted),
            "self_hosted" => Ok(DeploymentMode::SelfHosted),
            other => Err(ConfigError::InvalidValue {
                field: "ai.deployment_mode".to_string(),
                reason: format!("expected 'hosted' or 'self_hosted', got '{}'", other),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    pub deployment_mode: DeploymentMode,
    #[serde(default)]
    pub hosted_api_key: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    pub endpoint: String,
    pub model: String,
    pub requests_per_minute: u32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            deployment_mode: DeploymentMode::SelfHosted,
            hosted_api_key: None,
            api_key: None,
            endpoint: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            requests_per_minute: 5,
        }
    }
}

impl AiConfig {
    /// Provider key for the configured deployment mode
    pub fn active_api_key(&self) -> Option<SecretString> {
        let key = match self.deployment_mode {
            DeploymentMode::Hosted => self.hosted_api_key.as_ref(),
            DeploymentMode::SelfHosted => self.api_key.as_ref(),
        };
        key.filter(|k| !k.is_empty())
            .map(|k| SecretString::from(k.as_str()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BillingConfig {
    /// Maps billing price identifiers to plan ids ("pro", "business")
    #[serde(default)]
    pub price_plans: HashMap<String, String>,
    /// Per-plan overrides of the built-in caps, keyed by plan id
    #[serde(default)]
    pub plan_limits: HashMap<String, PlanLimitOverride>,
}

/// Replacement caps for one plan; omitted fields keep the built-in value
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct PlanLimitOverride {
    pub articles_published: Option<u64>,
    pub thumbnails_generated: Option<u64>,
    pub ai_suggestions: Option<u64>,
    pub ai_enabled: Option<bool>,
}

impl Config {
    /// Load configuration from the default location
    ///
    /// The path comes from `QUILLCAST_CONFIG` or the XDG config directory.
    /// A missing file is not an error; defaults are used instead. Environment
    /// overrides are applied last.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the file cannot be read or parsed, or when
    /// a value (including an overriding environment variable) is invalid.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use libquillcast::Config;
    ///
    /// let config = Config::load()?;
    /// println!("Listening on {}", config.server.bind_addr);
    /// # Ok::<(), libquillcast::QuillcastError>(())
    /// ```
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        let mut config = if config_path.exists() {
            Self::load_from_path(&config_path)?
        } else {
            tracing::debug!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            Self::default_config()
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load configuration from a specific path
    ///
    /// # Arguments
    ///
    /// * `path` - TOML file to read; no environment overrides are applied
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self::default()
    }

    /// Overlay environment variables onto the loaded configuration
    ///
    /// Recognized variables: `CRON_SECRET`, `QUILLCAST_DB_PATH`,
    /// `QUILLCAST_BIND_ADDR`, `QUILLCAST_DEPLOYMENT_MODE`,
    /// `QUILLCAST_HOSTED_AI_KEY` and `QUILLCAST_AI_KEY`. An empty
    /// `CRON_SECRET` leaves the cron endpoint open.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(secret) = std::env::var("CRON_SECRET") {
            self.server.cron_secret = Some(secret);
        }
        if let Ok(path) = std::env::var("QUILLCAST_DB_PATH") {
            self.database.path = path;
        }
        if let Ok(addr) = std::env::var("QUILLCAST_BIND_ADDR") {
            self.server.bind_addr = addr;
        }
        if let Ok(mode) = std::env::var("QUILLCAST_DEPLOYMENT_MODE") {
            self.ai.deployment_mode = mode.parse()?;
        }
        if let Ok(key) = std::env::var("QUILLCAST_HOSTED_AI_KEY") {
            self.ai.hosted_api_key = Some(key);
        }
        if let Ok(key) = std::env::var("QUILLCAST_AI_KEY") {
            self.ai.api_key = Some(key);
        }

        // An empty secret would make every request match a missing header
        if self.server.cron_secret.as_deref() == Some("") {
            self.server.cron_secret = None;
        }

        self.validate()
    }

    fn validate(&self) -> Result<()> {
        if self.database.path.trim().is_empty() {
            return Err(ConfigError::MissingField("database.path".to_string()).into());
        }
        if self.scheduler.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scheduler.batch_size".to_string(),
                reason: "must be at least 1".to_string(),
            }
            .into());
        }
        if self.scheduler.max_retries == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scheduler.max_retries".to_string(),
                reason: "must be at least 1".to_string(),
            }
            .into());
        }
        self.scheduler.poll_interval()?;
        self.analytics.cache_ttl()?;
        Ok(())
    }
}

fn parse_duration_field(field: &str, value: &str) -> Result<Duration> {
    humantime::parse_duration(value).map_err(|e| {
        ConfigError::InvalidValue {
            field: field.to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("QUILLCAST_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("quillcast").join("config.toml"))
}

/// Expand `~` in the database path
pub fn resolve_db_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).to_string())
}
