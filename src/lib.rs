//! # spark-auth
//!
//! Bearer-token cache for the (unofficial) HARMAN Spark vehicle telemetry API.
//!
//! Logging in to Spark is slow: the only way in is an interactive login page
//! whose redirect carries the access token. This crate keeps the last token
//! per user in a relational store and only performs a live login when the
//! cached token is missing, belongs to a different password, or is within a
//! minute of expiring.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! #[tokio::main]
//! async fn main() -> Result<(), spark_auth::Error> {
//!     // SPARK_DATABASE_URL, SPARK_LOGIN_COMMAND, ... are read from the environment.
//!     let token = spark_auth::authenticate("alice@example.com", "secret").await?;
//!     println!("token valid until {}", token.expires_at);
//!     Ok(())
//! }
//! ```
//!
//! ## Explicit wiring
//!
//! ```rust
//! use std::sync::Arc;
//! use spark_auth::{AuthCache, MemoryStore, StaticProvider};
//!
//! # async fn example() -> spark_auth::Result<()> {
//! let cache = AuthCache::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(StaticProvider::new("Bearer dev-token", chrono::Duration::hours(1))),
//! );
//! let token = cache.attempt("alice", "secret").await?;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod auth;
pub mod config;
pub mod fingerprint;
pub mod observability;
pub mod store;

pub use auth::{
    AuthCache, CommandProvider, CredentialRecord, DEFAULT_REFRESH_MARGIN, PasswordGrantProvider,
    StaticProvider, TokenProvider, TokenResult, parse_redirect,
};
pub use config::{ConfigError, EnvSource, Settings};
pub use fingerprint::{Fingerprint, fingerprint};
#[cfg(feature = "postgres")]
pub use store::PostgresStore;
pub use store::{
    CredentialStore, MemoryStore, PreferenceStore, ResponseLog, ResponseRecord, StoreError,
    StoreResult,
};

/// Error type for spark-auth operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Live login failed: rejected credentials, unreachable provider,
    /// unexpected response shape or login timeout.
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    /// The credential store could not be read or written.
    #[error("Credential store unavailable: {message}")]
    StoreUnavailable { message: String },

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Error category for unified error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The identity provider refused or could not be reached
    Authentication,
    /// The credential store failed
    Storage,
    /// Settings are missing or invalid
    Configuration,
}

impl Error {
    pub fn auth(message: impl Into<String>) -> Self {
        Error::Auth {
            message: message.into(),
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        Error::StoreUnavailable {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Auth { .. } => ErrorCategory::Authentication,
            Error::StoreUnavailable { .. } => ErrorCategory::Storage,
            Error::Config(_) => ErrorCategory::Configuration,
        }
    }

    pub fn is_authentication_error(&self) -> bool {
        self.category() == ErrorCategory::Authentication
    }

    pub fn is_store_unavailable(&self) -> bool {
        self.category() == ErrorCategory::Storage
    }

    pub fn is_configuration_error(&self) -> bool {
        self.category() == ErrorCategory::Configuration
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidIdentifier { name } => {
                Error::Config(format!("Invalid table name: {}", name))
            }
            other => Error::store(other.to_string()),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NotFound { key } => Error::Config(format!("Key not found: {}", key)),
            ConfigError::InvalidValue { key, message } => {
                Error::Config(format!("Invalid value for {}: {}", key, message))
            }
            other => Error::Config(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Return a usable token for `username`, logging in only when necessary.
///
/// Settings come from `SPARK_*` environment variables; see [`Settings`].
pub async fn authenticate(username: &str, password: &str) -> Result<TokenResult> {
    let settings = Settings::from_env()?;
    let cache = AuthCache::from_settings(&settings).await?;
    cache.attempt(username, password).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::auth("Unable to authenticate with Harman Spark API");
        assert!(err.to_string().contains("Harman Spark"));
        assert!(err.to_string().starts_with("Authentication failed"));
    }

    #[test]
    fn test_error_categories() {
        assert!(Error::auth("bad password").is_authentication_error());
        assert!(Error::store("connection refused").is_store_unavailable());
        assert!(Error::Config("missing".into()).is_configuration_error());
        assert!(!Error::store("down").is_authentication_error());
    }

    #[test]
    fn test_store_error_conversion() {
        let err: Error = StoreError::Storage {
            message: "pool timed out".into(),
        }
        .into();
        assert!(err.is_store_unavailable());
        assert!(err.to_string().contains("pool timed out"));

        let err: Error = StoreError::InvalidIdentifier {
            name: "auth_data; drop".into(),
        }
        .into();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_config_error_conversion() {
        let err: Error = ConfigError::InvalidValue {
            key: "login.timeout.secs".into(),
            message: "invalid digit found in string".into(),
        }
        .into();
        assert!(matches!(err, Error::Config(ref m) if m.contains("login.timeout.secs")));
    }
}
