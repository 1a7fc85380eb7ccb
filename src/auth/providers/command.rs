//! Login through an external command.
//!
//! The Spark portal only offers an interactive login page, so the browser
//! automation lives outside this crate: a command receives the credentials in
//! its environment, drives the login, and prints the URL it was redirected to.
//! The last non-empty line of stdout is parsed with [`parse_redirect`].

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::process::Command;

use super::parse_redirect;
use crate::auth::{TokenProvider, TokenResult};
use crate::{Error, Result};

pub const USERNAME_ENV: &str = "SPARK_USERNAME";
pub const PASSWORD_ENV: &str = "SPARK_PASSWORD";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct CommandProvider {
    command: String,
    timeout: Duration,
}

impl CommandProvider {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    async fn run(&self, username: &str, password: &str) -> Result<String> {
        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(&self.command)
            .env(USERNAME_ENV, username)
            .env(PASSWORD_ENV, password)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| {
                Error::auth(format!(
                    "Login command timed out after {:.1}s",
                    self.timeout.as_secs_f64()
                ))
            })?
            .map_err(|e| Error::auth(format!("Login command failed: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::auth(format!(
                "Login command failed ({}): {}",
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout
            .lines()
            .map(str::trim)
            .rfind(|line| !line.is_empty())
            .map(str::to_string)
            .ok_or_else(|| Error::auth("Login command printed no redirect URL"))
    }
}

#[async_trait]
impl TokenProvider for CommandProvider {
    fn name(&self) -> &str {
        "command"
    }

    async fn login(&self, username: &str, password: &str) -> Result<TokenResult> {
        let redirect = self.run(username, password).await?;
        parse_redirect(&redirect, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[tokio::test]
    async fn test_parses_last_line() {
        let provider = CommandProvider::new(
            "echo 'loading login page'; echo 'https://spark/cb#access_token=abc&token_type=Bearer&expires_in=3600'",
        );
        let token = provider.login("alice", "secret").await.unwrap();
        assert_eq!(token.token.expose_secret(), "Bearer abc");
    }

    #[tokio::test]
    async fn test_credentials_passed_in_env() {
        let provider = CommandProvider::new(
            r#"echo "https://spark/cb#access_token=${SPARK_USERNAME}-${SPARK_PASSWORD}&token_type=Bearer&expires_in=60""#,
        );
        let token = provider.login("alice", "secret").await.unwrap();
        assert_eq!(token.token.expose_secret(), "Bearer alice-secret");
    }

    #[tokio::test]
    async fn test_nonzero_exit() {
        let provider = CommandProvider::new("echo 'invalid credentials' >&2; exit 3");
        let err = provider.login("alice", "wrong").await.unwrap_err();
        assert!(err.is_authentication_error());
        assert!(err.to_string().contains("invalid credentials"));
    }

    #[tokio::test]
    async fn test_no_output() {
        let provider = CommandProvider::new("true");
        let err = provider.login("alice", "secret").await.unwrap_err();
        assert!(err.to_string().contains("no redirect URL"));
    }

    #[tokio::test]
    async fn test_unparseable_redirect() {
        let provider = CommandProvider::new("echo https://spark/login");
        let err = provider.login("alice", "secret").await.unwrap_err();
        assert!(err.is_authentication_error());
    }

    #[tokio::test]
    async fn test_timeout() {
        let provider =
            CommandProvider::new("sleep 5").with_timeout(Duration::from_millis(100));
        let err = provider.login("alice", "secret").await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
