//! Environment variable source.
//!
//! Dotted keys map to upper-case variables: with prefix `SPARK_`,
//! `login.timeout.secs` is read from `SPARK_LOGIN_TIMEOUT_SECS`.

use super::{ConfigError, ConfigResult};

pub const ENV_PREFIX: &str = "SPARK_";

/// Read-only environment variable source.
#[derive(Debug, Clone, Default)]
pub struct EnvSource {
    prefix: Option<String>,
}

impl EnvSource {
    /// Create a new environment source with no prefix
    pub fn new() -> Self {
        Self { prefix: None }
    }

    /// Create an environment source with a prefix
    pub fn prefixed(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }

    /// Get the full environment variable name
    pub fn env_key(&self, key: &str) -> String {
        let name = key.to_uppercase().replace('.', "_");
        match &self.prefix {
            Some(prefix) => format!("{}{}", prefix, name),
            None => name,
        }
    }

    pub fn get_raw(&self, key: &str) -> ConfigResult<Option<String>> {
        match std::env::var(self.env_key(key)) {
            Ok(value) => Ok(Some(value)),
            Err(std::env::VarError::NotPresent) => Ok(None),
            Err(e) => Err(ConfigError::Env(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_key_conversion() {
        let source = EnvSource::new();
        assert_eq!(source.env_key("database.url"), "DATABASE_URL");

        let source = EnvSource::prefixed(ENV_PREFIX);
        assert_eq!(source.env_key("login.timeout.secs"), "SPARK_LOGIN_TIMEOUT_SECS");
    }

    #[test]
    fn test_env_source_get() {
        let source = EnvSource::prefixed("SPARK_AUTH_TEST_");

        // SAFETY: Test-only environment setup, unique variable name
        unsafe { std::env::set_var("SPARK_AUTH_TEST_LOGIN_COMMAND", "/bin/login.sh") };
        let value = source.get_raw("login.command").unwrap();
        assert_eq!(value.as_deref(), Some("/bin/login.sh"));
        unsafe { std::env::remove_var("SPARK_AUTH_TEST_LOGIN_COMMAND") };

        assert!(source.get_raw("login.command").unwrap().is_none());
    }
}
