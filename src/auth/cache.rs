//! Token cache with opportunistic refresh.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use tracing::Instrument;

use super::{CredentialRecord, TokenProvider, TokenResult, providers};
use crate::config::Settings;
use crate::fingerprint::{Fingerprint, fingerprint};
use crate::observability::{auth_attempt_span, login_span};
use crate::store::{self, CredentialStore};
use crate::{Error, Result};

/// Cached tokens with this much lifetime left or less are refreshed.
pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::minutes(1);

/// Serves stored tokens and falls back to a live login.
///
/// A stored token is reused only when the password fingerprint matches and
/// more than the refresh margin remains before expiry. Anything else (no
/// record, different password, token about to expire) triggers a login whose
/// result replaces the stored record.
pub struct AuthCache {
    store: Arc<dyn CredentialStore>,
    provider: Arc<dyn TokenProvider>,
    refresh_margin: Duration,
    login_timeout: Option<StdDuration>,
}

impl AuthCache {
    pub fn new(store: Arc<dyn CredentialStore>, provider: Arc<dyn TokenProvider>) -> Self {
        Self {
            store,
            provider,
            refresh_margin: DEFAULT_REFRESH_MARGIN,
            login_timeout: None,
        }
    }

    /// Wire provider and store from settings.
    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        settings.validate()?;
        let provider = providers::from_settings(settings)?;
        let store = store::from_settings(settings).await?;
        let margin = Duration::from_std(settings.refresh_margin).map_err(|e| {
            Error::Config(format!("Invalid refresh margin: {}", e))
        })?;

        Ok(Self::new(store, provider)
            .with_refresh_margin(margin)
            .with_login_timeout(settings.login_timeout))
    }

    pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = margin;
        self
    }

    /// Abort live logins that take longer than `timeout`.
    pub fn with_login_timeout(mut self, timeout: StdDuration) -> Self {
        self.login_timeout = Some(timeout);
        self
    }

    pub fn refresh_margin(&self) -> Duration {
        self.refresh_margin
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Return a usable token for the credentials, logging in if needed.
    ///
    /// Fails with [`Error::Auth`] when the live login fails and with
    /// [`Error::StoreUnavailable`] when the store cannot be read or written;
    /// no partial result is returned in either case.
    pub async fn attempt(&self, username: &str, password: &str) -> Result<TokenResult> {
        let user = fingerprint(username);
        let pass = fingerprint(password);

        async move {
            if let Some(token) = self.cached(user, pass).await? {
                tracing::debug!(expires_at = %token.expires_at, "Serving cached token");
                return Ok(token);
            }

            let token = self.login(username, password).await?;
            let record = CredentialRecord::new(user, pass, &token);
            self.store.upsert(&record).await.inspect_err(|e| {
                tracing::warn!(store = self.store.name(), error = %e, "Failed to persist token");
            })?;

            tracing::info!(expires_at = %token.expires_at, "Token refreshed");
            Ok(token)
        }
        .instrument(auth_attempt_span(user, self.provider.name()))
        .await
    }

    async fn cached(&self, user: Fingerprint, pass: Fingerprint) -> Result<Option<TokenResult>> {
        let record = self.store.get(user).await.inspect_err(|e| {
            tracing::warn!(store = self.store.name(), error = %e, "Credential lookup failed");
        })?;

        let Some(record) = record else {
            tracing::debug!("No cached token");
            return Ok(None);
        };

        if !record.matches_password(pass) {
            tracing::debug!("Password fingerprint changed, discarding cached token");
            return Ok(None);
        }

        let token = record.token_result();
        if !token.is_usable_at(Utc::now(), self.refresh_margin) {
            tracing::debug!(expires_at = %token.expires_at, "Cached token expiring");
            return Ok(None);
        }

        Ok(Some(token))
    }

    async fn login(&self, username: &str, password: &str) -> Result<TokenResult> {
        let provider = self.provider.name();
        let login = self
            .provider
            .login(username, password)
            .instrument(login_span(provider));

        let result = match self.login_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, login).await {
                Ok(result) => result,
                Err(_) => Err(Error::auth(format!(
                    "{} login timed out after {:.1}s",
                    provider,
                    timeout.as_secs_f64()
                ))),
            },
            None => login.await,
        };

        if let Err(e) = &result {
            tracing::warn!(error = %e, "Live login failed");
        }
        result
    }
}

impl std::fmt::Debug for AuthCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthCache")
            .field("store", &self.store.name())
            .field("provider", &self.provider.name())
            .field("refresh_margin", &self.refresh_margin)
            .field("login_timeout", &self.login_timeout)
            .finish()
    }
}
