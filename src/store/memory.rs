//! In-memory store (for testing and single-process deployments).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CredentialStore, PreferenceStore, ResponseLog, ResponseRecord, StoreResult};
use crate::auth::CredentialRecord;
use crate::fingerprint::Fingerprint;

#[derive(Debug, Default)]
pub struct MemoryStore {
    credentials: Arc<RwLock<HashMap<Fingerprint, CredentialRecord>>>,
    preferences: Arc<RwLock<HashMap<Fingerprint, String>>>,
    responses: Arc<RwLock<Vec<ResponseRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored credential records.
    pub async fn count(&self) -> usize {
        self.credentials.read().await.len()
    }

    pub async fn clear(&self) {
        self.credentials.write().await.clear();
        self.preferences.write().await.clear();
        self.responses.write().await.clear();
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, user: Fingerprint) -> StoreResult<Option<CredentialRecord>> {
        let credentials = self.credentials.read().await;
        Ok(credentials.get(&user).cloned())
    }

    async fn upsert(&self, record: &CredentialRecord) -> StoreResult<()> {
        let mut credentials = self.credentials.write().await;
        credentials.insert(record.user_fingerprint, record.clone());
        Ok(())
    }
}

#[async_trait]
impl PreferenceStore for MemoryStore {
    async fn default_vehicle(&self, user: Fingerprint) -> StoreResult<Option<String>> {
        Ok(self.preferences.read().await.get(&user).cloned())
    }

    async fn set_default_vehicle(&self, user: Fingerprint, vehicle_id: &str) -> StoreResult<()> {
        self.preferences
            .write()
            .await
            .insert(user, vehicle_id.to_string());
        Ok(())
    }
}

#[async_trait]
impl ResponseLog for MemoryStore {
    async fn record(&self, response: &ResponseRecord) -> StoreResult<()> {
        self.responses.write().await.push(response.clone());
        Ok(())
    }

    async fn recent(
        &self,
        user: Fingerprint,
        endpoint: &str,
        vehicle_id: Option<&str>,
        limit: usize,
    ) -> StoreResult<Vec<ResponseRecord>> {
        let responses = self.responses.read().await;
        let mut matching: Vec<ResponseRecord> = responses
            .iter()
            .filter(|r| {
                r.user == user && r.endpoint == endpoint && r.vehicle_id.as_deref() == vehicle_id
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.retrieved_at.cmp(&a.retrieved_at));
        matching.truncate(limit);
        Ok(matching)
    }
}
