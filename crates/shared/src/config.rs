use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::config_env::{optional_trimmed_env, parse_u32_env, parse_u64_env, require_env};

const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
pub const DEFAULT_MANUAL_CRAWL_REFRESH_DELAY_MS: u64 = 30_000;
pub const DEFAULT_AUTO_CRAWL_REFRESH_DELAY_MS: u64 = 60_000;
pub const DEFAULT_CONVERSATION_IDLE_TTL_SECS: u64 = 3_600;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: String,
    pub database_url: String,
    pub database_max_connections: u32,
    pub migrations_dir: PathBuf,
    pub backend: BackendConfig,
    pub refresh_delays: RefreshDelays,
    pub conversation_idle_ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: String,
}

/// One-shot status refresh delays applied after crawl submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshDelays {
    pub manual: Duration,
    pub auto: Duration,
}

impl Default for RefreshDelays {
    fn default() -> Self {
        Self {
            manual: Duration::from_millis(DEFAULT_MANUAL_CRAWL_REFRESH_DELAY_MS),
            auto: Duration::from_millis(DEFAULT_AUTO_CRAWL_REFRESH_DELAY_MS),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    MissingVar(String),
    #[error("invalid integer in env var {0}")]
    ParseInt(String),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Loads `.env` from the working directory if present. Real environment
/// variables win over file entries.
pub fn load_dotenv() -> Result<(), ConfigError> {
    match dotenvy::dotenv() {
        Ok(_) => Ok(()),
        Err(err) if err.not_found() => Ok(()),
        Err(err) => Err(ConfigError::InvalidConfiguration(format!(
            "failed to load .env file: {err}"
        ))),
    }
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            bind_addr: env::var("API_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string()),
            database_url: require_env("DATABASE_URL")?,
            database_max_connections: parse_u32_env("DATABASE_MAX_CONNECTIONS", 10)?,
            migrations_dir: env::var("MIGRATIONS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../db/migrations")
                }),
            backend: BackendConfig::from_env()?,
            refresh_delays: RefreshDelays::from_env()?,
            conversation_idle_ttl: Duration::from_secs(parse_u64_env(
                "CONVERSATION_IDLE_TTL_SECS",
                DEFAULT_CONVERSATION_IDLE_TTL_SECS,
            )?),
        })
    }
}

impl BackendConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = optional_trimmed_env("RETRIEVER_BACKEND_URL")
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());
        Self::new(base_url)
    }

    pub fn new(base_url: impl Into<String>) -> Result<Self, ConfigError> {
        let base_url = base_url.into();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::InvalidConfiguration(
                "RETRIEVER_BACKEND_URL must start with http:// or https://".to_string(),
            ));
        }

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl RefreshDelays {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            manual: Duration::from_millis(parse_u64_env(
                "MANUAL_CRAWL_REFRESH_DELAY_MS",
                DEFAULT_MANUAL_CRAWL_REFRESH_DELAY_MS,
            )?),
            auto: Duration::from_millis(parse_u64_env(
                "AUTO_CRAWL_REFRESH_DELAY_MS",
                DEFAULT_AUTO_CRAWL_REFRESH_DELAY_MS,
            )?),
        })
    }
}
