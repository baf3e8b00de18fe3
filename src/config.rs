//! Configuration management for replan.
//!
//! Configuration can be set via environment variables:
//! - `OPENROUTER_API_KEY` - Required. API key for the scheduling optimizer.
//! - `OPTIMIZER_MODEL` - Optional. Model identifier in OpenRouter format. Defaults to `openai/gpt-4o-mini`.
//! - `OPTIMIZER_TIMEOUT_SECS` - Optional. Hard timeout per optimizer request. Defaults to `60`.
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `3000`.
//! - `TASK_STORE` - Optional. `memory` or `sqlite`. Defaults to `sqlite`.
//! - `DATA_DIR` - Optional. SQLite data directory. Defaults to `./data`.
//! - `MAX_REARRANGE_ATTEMPTS` - Optional. Conflict-retry budget per rearrangement. Defaults to `3`.
//! - `REARRANGE_INCLUDE_COMPLETED` - Optional. Keep completed tasks in the candidate pool. Defaults to `false`.
//! - `MIN_GAP_MINUTES` - Optional. Minimum gap guidance for the optimizer. Defaults to `0`.
//! - `NOTIFY_WEBHOOK_URL` - Optional. Webhook receiving task reminders; log-only when unset.

use std::path::PathBuf;
use thiserror::Error;

use crate::store::TaskStoreKind;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// OpenRouter API key for the optimizer gateway
    pub api_key: String,

    /// Optimizer model identifier (OpenRouter format)
    pub optimizer_model: String,

    /// Hard timeout per optimizer request, in seconds
    pub optimizer_timeout_secs: u64,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Task store backend
    pub store: TaskStoreKind,

    /// Data directory for the SQLite store
    pub data_dir: PathBuf,

    /// Conflict-retry budget per rearrangement call
    pub max_rearrange_attempts: u32,

    /// Whether completed tasks remain rearrangement candidates
    pub rearrange_include_completed: bool,

    /// Minimum gap between consecutive tasks, as optimizer guidance
    pub min_gap_minutes: u32,

    /// Webhook URL for task reminders
    pub notify_webhook_url: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `OPENROUTER_API_KEY` is not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("OPENROUTER_API_KEY".to_string()))?;

        let optimizer_model = std::env::var("OPTIMIZER_MODEL")
            .unwrap_or_else(|_| "openai/gpt-4o-mini".to_string());

        let optimizer_timeout_secs = parse_env("OPTIMIZER_TIMEOUT_SECS", 60)?;

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = parse_env("PORT", 3000)?;

        let store = std::env::var("TASK_STORE")
            .map(|s| TaskStoreKind::from_str(&s))
            .unwrap_or_default();

        let data_dir = std::env::var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));

        let max_rearrange_attempts = parse_env("MAX_REARRANGE_ATTEMPTS", 3)?;

        let rearrange_include_completed = parse_env("REARRANGE_INCLUDE_COMPLETED", false)?;

        let min_gap_minutes = parse_env("MIN_GAP_MINUTES", 0)?;

        let notify_webhook_url = std::env::var("NOTIFY_WEBHOOK_URL").ok();

        Ok(Self {
            api_key,
            optimizer_model,
            optimizer_timeout_secs,
            host,
            port,
            store,
            data_dir,
            max_rearrange_attempts,
            rearrange_include_completed,
            min_gap_minutes,
            notify_webhook_url,
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(api_key: String, optimizer_model: String, data_dir: PathBuf) -> Self {
        Self {
            api_key,
            optimizer_model,
            optimizer_timeout_secs: 60,
            host: "127.0.0.1".to_string(),
            port: 3000,
            store: TaskStoreKind::default(),
            data_dir,
            max_rearrange_attempts: 3,
            rearrange_include_completed: false,
            min_gap_minutes: 0,
            notify_webhook_url: None,
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("{}", e))),
        Err(_) => Ok(default),
    }
}
