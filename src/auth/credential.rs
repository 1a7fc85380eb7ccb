//! Token and credential record types.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use secrecy::{ExposeSecret, SecretString};

use crate::fingerprint::Fingerprint;

/// Bearer token with its absolute expiry, as handed to callers.
///
/// `token` is the full `Authorization` header value (e.g. `"Bearer abc"`).
/// `expires_at` is kept at microsecond precision, the resolution of the
/// database column, so stored and freshly issued tokens compare equal.
#[derive(Clone, Debug)]
pub struct TokenResult {
    pub token: SecretString,
    pub expires_at: DateTime<Utc>,
}

impl TokenResult {
    pub fn new(token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: SecretString::from(token.into()),
            expires_at: expires_at.trunc_subsecs(6),
        }
    }

    /// Token expiring `lifetime` from now.
    pub fn expiring_in(token: impl Into<String>, lifetime: Duration) -> Self {
        Self::new(token, Utc::now() + lifetime)
    }

    /// Time left before expiry, negative once expired.
    pub fn remaining_at(&self, now: DateTime<Utc>) -> Duration {
        self.expires_at - now
    }

    /// Whether more than `margin` of lifetime remains.
    pub fn is_usable_at(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        self.remaining_at(now) > margin
    }

    pub fn is_usable(&self, margin: Duration) -> bool {
        self.is_usable_at(Utc::now(), margin)
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Persisted token state for one user fingerprint.
#[derive(Clone, Debug)]
pub struct CredentialRecord {
    pub user_fingerprint: Fingerprint,
    pub pass_fingerprint: Fingerprint,
    pub token: SecretString,
    pub token_expires_at: DateTime<Utc>,
}

impl CredentialRecord {
    pub fn new(user: Fingerprint, pass: Fingerprint, token: &TokenResult) -> Self {
        Self {
            user_fingerprint: user,
            pass_fingerprint: pass,
            token: token.token.clone(),
            token_expires_at: token.expires_at,
        }
    }

    pub fn matches_password(&self, pass: Fingerprint) -> bool {
        self.pass_fingerprint == pass
    }

    pub fn token_result(&self) -> TokenResult {
        TokenResult {
            token: self.token.clone(),
            expires_at: self.token_expires_at,
        }
    }

    /// Field-wise equality, including the token value.
    pub fn same_as(&self, other: &CredentialRecord) -> bool {
        self.user_fingerprint == other.user_fingerprint
            && self.pass_fingerprint == other.pass_fingerprint
            && self.token.expose_secret() == other.token.expose_secret()
            && self.token_expires_at == other.token_expires_at
    }
}
