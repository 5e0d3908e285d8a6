//! Configuration management for the to-do list service.
//!
//! Configuration can be set via environment variables (a `.env` file in the
//! working directory is loaded first by the binary):
//! - `DATABASE_URL` - Required. Document store connection string, either
//!   `memory://` or `sqlite://<path>`. `MONGODB_URI` is accepted as an alias.
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `3000`.
//! - `STATIC_DIR` - Optional. Directory served for paths no route matches.
//! - `DEFAULT_LIST_LIMIT` - Optional. Page size for `GET /lists`. Defaults to `100`.

use std::path::PathBuf;
use thiserror::Error;

use crate::service::DEFAULT_LIST_LIMIT;
use crate::store::StoreType;

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
    /// Document store backend
    pub store: StoreType,

    /// Server host
    pub host: String,

    /// Server port (0 picks a free port)
    pub port: u16,

    /// Static files served as the fallback
    pub static_dir: Option<PathBuf>,

    /// Page size when a listing omits `limit`
    pub default_list_limit: usize,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if no connection string is set, and
    /// `ConfigError::InvalidValue` if it or any optional value does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("DATABASE_URL")
            .or_else(|| lookup("MONGODB_URI"))
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?;
        let store = StoreType::from_url(&database_url).ok_or_else(|| {
            ConfigError::InvalidValue(
                "DATABASE_URL".to_string(),
                format!(
                    "unsupported connection string {:?} (expected memory:// or sqlite://<path>)",
                    database_url
                ),
            )
        })?;

        let host = lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string());

        let port = lookup("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse()
            .map_err(|e| ConfigError::InvalidValue("PORT".to_string(), format!("{}", e)))?;

        let static_dir = lookup("STATIC_DIR")
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from);

        let default_list_limit = match lookup("DEFAULT_LIST_LIMIT") {
            Some(value) => value.parse().map_err(|e| {
                ConfigError::InvalidValue("DEFAULT_LIST_LIMIT".to_string(), format!("{}", e))
            })?,
            None => DEFAULT_LIST_LIMIT,
        };

        Ok(Self {
            store,
            host,
            port,
            static_dir,
            default_list_limit,
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(store: StoreType) -> Self {
        Self {
            store,
            host: "127.0.0.1".to_string(),
            port: 3000,
            static_dir: None,
            default_list_limit: DEFAULT_LIST_LIMIT,
        }
    }
}
