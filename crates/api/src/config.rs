//! Application configuration loaded from environment variables.

use std::path::PathBuf;

use common::UserId;
use store::StockPolicy;
use thiserror::Error;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// A configuration value that could not be parsed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {name}: {value:?}")]
    Invalid { name: &'static str, value: String },

    #[error("invalid SESSIONS entry {0:?}: expected token=user-uuid")]
    Session(String),
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT` — `text` or `json` (default: `text`)
/// - `DATABASE_URL` — PostgreSQL URL; unset means the in-memory store
/// - `DATABASE_MAX_CONNECTIONS` — pool size (default: `10`)
/// - `STOCK_POLICY` — `reject` or `allow-negative` (default: `reject`)
/// - `CATALOG_SEED_PATH` — JSON catalog loaded at startup
/// - `SESSIONS` — comma separated `token=user-uuid` pairs
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub stock_policy: StockPolicy,
    pub catalog_seed_path: Option<PathBuf>,
    pub sessions: Vec<(String, UserId)>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through `lookup`, which returns a variable's value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let port = match var("PORT") {
            Some(v) => parse(&v, "PORT")?,
            None => defaults.port,
        };
        let max_connections = match var("DATABASE_MAX_CONNECTIONS") {
            Some(v) => parse(&v, "DATABASE_MAX_CONNECTIONS")?,
            None => defaults.max_connections,
        };
        let stock_policy = match var("STOCK_POLICY") {
            Some(v) => v.parse().map_err(|_| ConfigError::Invalid {
                name: "STOCK_POLICY",
                value: v,
            })?,
            None => defaults.stock_policy,
        };
        let log_format = match var("LOG_FORMAT").map(|v| v.to_ascii_lowercase()) {
            None => LogFormat::Text,
            Some(v) if v == "text" => LogFormat::Text,
            Some(v) if v == "json" => LogFormat::Json,
            Some(v) => {
                return Err(ConfigError::Invalid {
                    name: "LOG_FORMAT",
                    value: v,
                });
            }
        };
        let sessions = match var("SESSIONS") {
            Some(v) => parse_sessions(&v)?,
            None => Vec::new(),
        };

        Ok(Self {
            host: var("HOST").unwrap_or(defaults.host),
            port,
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
            log_format,
            database_url: var("DATABASE_URL"),
            max_connections,
            stock_policy,
            catalog_seed_path: var("CATALOG_SEED_PATH").map(PathBuf::from),
            sessions,
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            max_connections: 10,
            stock_policy: StockPolicy::Reject,
            catalog_seed_path: None,
            sessions: Vec::new(),
        }
    }
}

fn parse<T: std::str::FromStr>(value: &str, name: &'static str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        name,
        value: value.to_string(),
    })
}

fn parse_sessions(value: &str) -> Result<Vec<(String, UserId)>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (token, user) = entry
                .split_once('=')
                .ok_or_else(|| ConfigError::Session(entry.to_string()))?;
            let user = uuid::Uuid::parse_str(user.trim())
                .map_err(|_| ConfigError::Session(entry.to_string()))?;
            Ok((token.trim().to_string(), UserId::from_uuid(user)))
        })
        .collect()
}
