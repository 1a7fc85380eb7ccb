//! Token provider trait.

use async_trait::async_trait;

use super::TokenResult;
use crate::Result;

/// Performs a live login against the identity provider.
///
/// Implementations report every failure (rejected credentials, unreachable
/// provider, unexpected response) as [`crate::Error::Auth`].
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Provider name for debugging.
    fn name(&self) -> &str;

    /// Log in with plaintext credentials and return a fresh token.
    async fn login(&self, username: &str, password: &str) -> Result<TokenResult>;
}
