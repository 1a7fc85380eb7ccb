//! Persistence backends.
//!
//! [`CredentialStore`] owns the cached token per user fingerprint. The same
//! backends also keep per-user preferences ([`PreferenceStore`]) and the
//! history of raw telemetry responses ([`ResponseLog`]).

mod memory;
#[cfg(feature = "postgres")]
mod postgres;

pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::{PostgresStore, TableNames};

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::CredentialRecord;
use crate::config::Settings;
use crate::fingerprint::Fingerprint;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Invalid stored record: {message}")]
    InvalidRecord { message: String },

    #[error("Invalid SQL identifier: {name}")]
    InvalidIdentifier { name: String },
}

impl StoreError {
    pub fn storage(message: impl Into<String>) -> Self {
        StoreError::Storage {
            message: message.into(),
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Cached credentials keyed by user fingerprint.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    fn name(&self) -> &str;

    async fn get(&self, user: Fingerprint) -> StoreResult<Option<CredentialRecord>>;

    /// Insert the record, or replace every field of the existing record with
    /// the same user fingerprint, as one atomic operation.
    async fn upsert(&self, record: &CredentialRecord) -> StoreResult<()>;
}

/// Per-user settings that outlive a token.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn default_vehicle(&self, user: Fingerprint) -> StoreResult<Option<String>>;

    async fn set_default_vehicle(&self, user: Fingerprint, vehicle_id: &str) -> StoreResult<()>;
}

/// One raw telemetry response as retrieved for a user.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub user: Fingerprint,
    pub retrieved_at: DateTime<Utc>,
    pub endpoint: String,
    pub vehicle_id: Option<String>,
    pub data: serde_json::Value,
}

impl ResponseRecord {
    pub fn new(user: Fingerprint, endpoint: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            user,
            retrieved_at: Utc::now(),
            endpoint: endpoint.into(),
            vehicle_id: None,
            data,
        }
    }

    pub fn with_vehicle(mut self, vehicle_id: impl Into<String>) -> Self {
        self.vehicle_id = Some(vehicle_id.into());
        self
    }

    pub fn retrieved_at(mut self, at: DateTime<Utc>) -> Self {
        self.retrieved_at = at;
        self
    }
}

/// Append-only history of telemetry responses.
#[async_trait]
pub trait ResponseLog: Send + Sync {
    async fn record(&self, response: &ResponseRecord) -> StoreResult<()>;

    /// Most recent responses first. `vehicle_id` must match exactly: `None`
    /// only matches responses recorded without a vehicle.
    async fn recent(
        &self,
        user: Fingerprint,
        endpoint: &str,
        vehicle_id: Option<&str>,
        limit: usize,
    ) -> StoreResult<Vec<ResponseRecord>>;
}

/// Build the credential store described by `settings`.
///
/// Falls back to an in-process [`MemoryStore`] when no database is configured,
/// in which case tokens do not survive a restart.
pub async fn from_settings(settings: &Settings) -> StoreResult<Arc<dyn CredentialStore>> {
    match settings.database_url.as_deref() {
        #[cfg(feature = "postgres")]
        Some(url) => {
            let store = PostgresStore::connect_with_timeout(url, settings.database_timeout).await?;
            store.migrate().await?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "postgres"))]
        Some(_) => Err(StoreError::storage(
            "database.url is set but spark-auth was built without the `postgres` feature",
        )),
        None => {
            tracing::warn!("No database configured, cached tokens are kept in memory only");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
