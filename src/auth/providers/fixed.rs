//! Fixed-token provider.

use async_trait::async_trait;
use chrono::Duration;
use secrecy::{ExposeSecret, SecretString};

use crate::Result;
use crate::auth::{TokenProvider, TokenResult};

/// Provider returning the same token on every login, valid for `lifetime`
/// from the moment of the call. Useful for development and tests.
pub struct StaticProvider {
    token: SecretString,
    lifetime: Duration,
}

impl StaticProvider {
    pub fn new(token: impl Into<String>, lifetime: Duration) -> Self {
        Self {
            token: SecretString::from(token.into()),
            lifetime,
        }
    }
}

#[async_trait]
impl TokenProvider for StaticProvider {
    fn name(&self) -> &str {
        "static"
    }

    async fn login(&self, _username: &str, _password: &str) -> Result<TokenResult> {
        Ok(TokenResult::expiring_in(
            self.token.expose_secret(),
            self.lifetime,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_static_token() {
        let provider = StaticProvider::new("Bearer dev", Duration::hours(1));
        let token = provider.login("alice", "secret").await.unwrap();

        assert_eq!(token.token.expose_secret(), "Bearer dev");
        let remaining = token.remaining_at(Utc::now());
        assert!(remaining > Duration::minutes(59));
        assert!(remaining <= Duration::hours(1));
    }
}
