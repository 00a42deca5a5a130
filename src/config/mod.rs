//! Configuration module for the question bank backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::AppError;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit logs as JSON lines instead of human-readable text
    pub log_json: bool,
    /// Per-call datastore timeout
    pub db_timeout: Duration,
    /// Attempts made by the retry wrapper before giving up
    pub retry_max_attempts: u32,
    /// First backoff delay; doubled after each failed attempt
    pub retry_base_delay: Duration,
    /// Time-to-live of cached question lists
    pub questions_cache_ttl: Duration,
    /// Time-to-live of cached question searches
    pub search_cache_ttl: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/questions.sqlite"),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            log_level: "info".to_string(),
            log_json: false,
            db_timeout: Duration::from_millis(15_000),
            retry_max_attempts: 3,
            retry_base_delay: Duration::from_millis(1_000),
            questions_cache_ttl: Duration::from_secs(3_600),
            search_cache_ttl: Duration::from_secs(300),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let db_path = env::var("QBANK_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let bind_addr = parse_var("QBANK_BIND_ADDR")?.unwrap_or(defaults.bind_addr);

        let log_level = env::var("QBANK_LOG_LEVEL").unwrap_or(defaults.log_level);

        let log_json = parse_var("QBANK_LOG_JSON")?.unwrap_or(defaults.log_json);

        let db_timeout = parse_var("QBANK_DB_TIMEOUT_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.db_timeout);

        let retry_max_attempts =
            parse_var("QBANK_RETRY_MAX_ATTEMPTS")?.unwrap_or(defaults.retry_max_attempts);

        let retry_base_delay = parse_var("QBANK_RETRY_BASE_DELAY_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.retry_base_delay);

        let questions_cache_ttl = parse_var("QBANK_QUESTIONS_CACHE_TTL_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.questions_cache_ttl);

        let search_cache_ttl = parse_var("QBANK_SEARCH_CACHE_TTL_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.search_cache_ttl);

        Ok(Self {
            db_path,
            bind_addr,
            log_level,
            log_json,
            db_timeout,
            retry_max_attempts,
            retry_base_delay,
            questions_cache_ttl,
            search_cache_ttl,
        })
    }
}

/// Read and parse an optional environment variable.
fn parse_var<T>(name: &str) -> Result<Option<T>, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| AppError::Internal(format!("Invalid {} value {:?}: {}", name, raw, e))),
        Err(_) => Ok(None),
    }
}
