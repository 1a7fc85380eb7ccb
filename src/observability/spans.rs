//! Span definitions and subscriber setup.

use tracing::{Level, Span, span};

use crate::fingerprint::Fingerprint;

/// Tracing configuration.
#[derive(Clone, Debug, Default)]
pub struct TracingConfig {
    pub level: TracingLevel,
    /// Overrides `level` when set, using `EnvFilter` directive syntax.
    pub filter: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TracingLevel {
    #[default]
    Info,
    Debug,
    Trace,
}

impl TracingLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            TracingLevel::Info => "info",
            TracingLevel::Debug => "debug",
            TracingLevel::Trace => "trace",
        }
    }
}

impl TracingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(mut self, level: TracingLevel) -> Self {
        self.level = level;
        self
    }

    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Directive used when `RUST_LOG` is not set.
    pub fn directive(&self) -> String {
        self.filter
            .clone()
            .unwrap_or_else(|| self.level.as_str().to_string())
    }
}

/// Span wrapping one `AuthCache::attempt`. Carries fingerprints only, never
/// usernames or secrets.
pub fn auth_attempt_span(user: Fingerprint, provider: &str) -> Span {
    span!(
        Level::INFO,
        "auth.attempt",
        user = %user,
        provider = provider,
    )
}

pub fn login_span(provider: &str) -> Span {
    span!(Level::DEBUG, "auth.login", provider = provider)
}

/// Install a global fmt subscriber; `RUST_LOG` wins over `config`.
#[cfg(feature = "subscriber")]
pub fn init_tracing_subscriber(config: &TracingConfig) -> crate::Result<()> {
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.directive()))
        .map_err(|e| crate::Error::Config(format!("Invalid tracing filter: {}", e)))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .try_init()
        .map_err(|e| crate::Error::Config(format!("Tracing already initialized: {}", e)))
}
