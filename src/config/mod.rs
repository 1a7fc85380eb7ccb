//! Settings for wiring an [`AuthCache`](crate::AuthCache).
//!
//! ```rust,no_run
//! use spark_auth::config::Settings;
//!
//! # fn example() -> Result<(), spark_auth::ConfigError> {
//! // SPARK_DATABASE_URL, SPARK_LOGIN_COMMAND, SPARK_LOGIN_TIMEOUT_SECS, ...
//! let settings = Settings::from_env()?;
//! settings.validate()?;
//! # Ok(())
//! # }
//! ```

pub mod env;

pub use env::{ENV_PREFIX, EnvSource};

use std::collections::HashMap;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur in configuration operations
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Key not found
    #[error("Key not found: {key}")]
    NotFound {
        /// The key that was not found
        key: String,
    },

    /// Invalid configuration value
    #[error("Invalid value for {key}: {message}")]
    InvalidValue {
        /// The key with invalid value
        key: String,
        /// Error message
        message: String,
    },

    /// Environment variable error
    #[error("Environment error: {0}")]
    Env(#[from] std::env::VarError),
}

/// Result type for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

pub const DATABASE_URL: &str = "database.url";
pub const DATABASE_TIMEOUT_SECS: &str = "database.timeout.secs";
pub const LOGIN_COMMAND: &str = "login.command";
pub const LOGIN_TIMEOUT_SECS: &str = "login.timeout.secs";
pub const TOKEN_ENDPOINT: &str = "token.endpoint";
pub const CLIENT_ID: &str = "client.id";
pub const REFRESH_MARGIN_SECS: &str = "refresh.margin.secs";

const DEFAULT_DATABASE_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_LOGIN_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Runtime settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    /// PostgreSQL connection string; in-memory store when absent
    pub database_url: Option<String>,
    /// Bound on acquiring a database connection
    pub database_timeout: Duration,
    /// External login command printing the post-login redirect URL
    pub login_command: Option<String>,
    /// Bound on a single live login
    pub login_timeout: Duration,
    /// OAuth2 token endpoint for the password grant
    pub token_endpoint: Option<String>,
    /// OAuth2 client id sent with the password grant
    pub client_id: Option<String>,
    /// Cached tokens closer than this to expiry are refreshed
    pub refresh_margin: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: None,
            database_timeout: DEFAULT_DATABASE_TIMEOUT,
            login_command: None,
            login_timeout: DEFAULT_LOGIN_TIMEOUT,
            token_endpoint: None,
            client_id: None,
            refresh_margin: DEFAULT_REFRESH_MARGIN,
        }
    }
}

impl Settings {
    /// Load from `SPARK_*` environment variables.
    pub fn from_env() -> ConfigResult<Self> {
        let source = EnvSource::prefixed(ENV_PREFIX);
        Self::load(|key| source.get_raw(key))
    }

    /// Load from dotted keys (`"login.timeout.secs"`, ...).
    pub fn from_map(values: &HashMap<String, String>) -> ConfigResult<Self> {
        Self::load(|key| Ok(values.get(key).cloned()))
    }

    /// Load through an arbitrary key lookup. Empty values count as unset.
    pub fn load<F>(get: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> ConfigResult<Option<String>>,
    {
        let value = |key: &str| -> ConfigResult<Option<String>> {
            Ok(get(key)?
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()))
        };
        let secs = |key: &str, default: Duration| -> ConfigResult<Duration> {
            match value(key)? {
                Some(raw) => parse_secs(key, &raw),
                None => Ok(default),
            }
        };

        Ok(Self {
            database_url: value(DATABASE_URL)?,
            database_timeout: secs(DATABASE_TIMEOUT_SECS, DEFAULT_DATABASE_TIMEOUT)?,
            login_command: value(LOGIN_COMMAND)?,
            login_timeout: secs(LOGIN_TIMEOUT_SECS, DEFAULT_LOGIN_TIMEOUT)?,
            token_endpoint: value(TOKEN_ENDPOINT)?,
            client_id: value(CLIENT_ID)?,
            refresh_margin: secs(REFRESH_MARGIN_SECS, DEFAULT_REFRESH_MARGIN)?,
        })
    }

    /// Check that the settings describe exactly one login method and sane timeouts.
    pub fn validate(&self) -> ConfigResult<()> {
        match (&self.login_command, &self.token_endpoint) {
            (None, None) => {
                return Err(ConfigError::NotFound {
                    key: format!("{} or {}", LOGIN_COMMAND, TOKEN_ENDPOINT),
                });
            }
            (Some(_), Some(_)) => {
                return Err(ConfigError::InvalidValue {
                    key: TOKEN_ENDPOINT.into(),
                    message: format!("conflicts with {}", LOGIN_COMMAND),
                });
            }
            _ => {}
        }

        if let Some(endpoint) = &self.token_endpoint {
            url::Url::parse(endpoint).map_err(|e| ConfigError::InvalidValue {
                key: TOKEN_ENDPOINT.into(),
                message: e.to_string(),
            })?;
        }

        for (key, value) in [
            (LOGIN_TIMEOUT_SECS, self.login_timeout),
            (DATABASE_TIMEOUT_SECS, self.database_timeout),
        ] {
            if value.is_zero() {
                return Err(ConfigError::InvalidValue {
                    key: key.into(),
                    message: "must be greater than zero".into(),
                });
            }
        }

        Ok(())
    }
}

fn parse_secs(key: &str, raw: &str) -> ConfigResult<Duration> {
    raw.parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })
}
