//! PostgreSQL store.
//!
//! Enable with the `postgres` feature flag. Every value travels as a bound
//! parameter; table names cannot be bound, so they are checked against a plain
//! identifier pattern before being spliced into statements.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;

use super::{
    CredentialStore, PreferenceStore, ResponseLog, ResponseRecord, StoreError, StoreResult,
};
use crate::auth::CredentialRecord;
use crate::fingerprint::Fingerprint;

const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_CONNECTIONS: u32 = 5;

fn identifier_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*){0,2}$")
            .expect("valid identifier regex")
    })
}

/// Table names used by [`PostgresStore`], optionally schema-qualified.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableNames {
    pub credentials: String,
    pub preferences: String,
    pub responses: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            credentials: "auth_data".to_string(),
            preferences: "user_preferences".to_string(),
            responses: "response_data".to_string(),
        }
    }
}

impl TableNames {
    fn validate(&self) -> StoreResult<()> {
        for name in [&self.credentials, &self.preferences, &self.responses] {
            if !identifier_regex().is_match(name) {
                return Err(StoreError::InvalidIdentifier { name: name.clone() });
            }
        }
        Ok(())
    }
}

trait StorageResultExt<T> {
    fn storage_err(self) -> StoreResult<T>;
    fn storage_err_ctx(self, context: &str) -> StoreResult<T>;
}

impl<T> StorageResultExt<T> for Result<T, sqlx::Error> {
    fn storage_err(self) -> StoreResult<T> {
        self.map_err(|e| StoreError::storage(e.to_string()))
    }

    fn storage_err_ctx(self, context: &str) -> StoreResult<T> {
        self.map_err(|e| StoreError::storage(format!("{}: {}", context, e)))
    }
}

fn fingerprint_column(row: &PgRow, column: &str) -> StoreResult<Fingerprint> {
    let raw: i64 = row.try_get(column).storage_err_ctx(column)?;
    Fingerprint::from_i64(raw).ok_or_else(|| StoreError::InvalidRecord {
        message: format!("{} out of range: {}", column, raw),
    })
}

/// PostgreSQL-backed store.
#[derive(Clone, Debug)]
pub struct PostgresStore {
    pool: PgPool,
    tables: TableNames,
}

impl PostgresStore {
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        Self::connect_with_timeout(database_url, DEFAULT_ACQUIRE_TIMEOUT).await
    }

    /// Connect, bounding every connection acquire by `timeout`.
    pub async fn connect_with_timeout(database_url: &str, timeout: Duration) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(timeout)
            .connect(database_url)
            .await
            .storage_err_ctx("connect")?;
        Ok(Self::with_pool(pool))
    }

    /// Create with an existing connection pool.
    pub fn with_pool(pool: PgPool) -> Self {
        Self {
            pool,
            tables: TableNames::default(),
        }
    }

    /// Use custom (possibly schema-qualified) table names.
    pub fn with_tables(mut self, tables: TableNames) -> StoreResult<Self> {
        tables.validate()?;
        self.tables = tables;
        Ok(self)
    }

    pub fn tables(&self) -> &TableNames {
        &self.tables
    }

    /// Create the tables if they do not exist yet.
    pub async fn migrate(&self) -> StoreResult<()> {
        let index_name = format!(
            "idx_{}_lookup",
            self.tables
                .responses
                .rsplit('.')
                .next()
                .unwrap_or(&self.tables.responses)
        );
        let statements = [
            format!(
                r#"
                CREATE TABLE IF NOT EXISTS {} (
                    user_hash BIGINT PRIMARY KEY,
                    pass_hash BIGINT NOT NULL,
                    user_token TEXT NOT NULL,
                    user_token_expire_dt_tm TIMESTAMPTZ NOT NULL
                )
                "#,
                self.tables.credentials
            ),
            format!(
                r#"
                CREATE TABLE IF NOT EXISTS {} (
                    user_hash BIGINT PRIMARY KEY,
                    default_vehicle_id TEXT
                )
                "#,
                self.tables.preferences
            ),
            format!(
                r#"
                CREATE TABLE IF NOT EXISTS {} (
                    id BIGSERIAL PRIMARY KEY,
                    user_hash BIGINT NOT NULL,
                    retrieve_dt_tm TIMESTAMPTZ NOT NULL,
                    endpoint TEXT NOT NULL,
                    response_data JSONB NOT NULL,
                    vehicle_id TEXT
                )
                "#,
                self.tables.responses
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} (user_hash, endpoint, retrieve_dt_tm DESC)",
                index_name, self.tables.responses
            ),
        ];

        for statement in &statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .storage_err_ctx("migrate")?;
        }
        tracing::debug!(tables = ?self.tables, "Schema ready");
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for PostgresStore {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn get(&self, user: Fingerprint) -> StoreResult<Option<CredentialRecord>> {
        let query = format!(
            "SELECT pass_hash, user_token, user_token_expire_dt_tm FROM {} WHERE user_hash = $1",
            self.tables.credentials
        );

        let row = sqlx::query(&query)
            .bind(user.as_i64())
            .fetch_optional(&self.pool)
            .await
            .storage_err()?;

        let Some(row) = row else {
            return Ok(None);
        };

        let token: String = row.try_get("user_token").storage_err_ctx("user_token")?;
        let expires_at: DateTime<Utc> = row
            .try_get("user_token_expire_dt_tm")
            .storage_err_ctx("user_token_expire_dt_tm")?;

        Ok(Some(CredentialRecord {
            user_fingerprint: user,
            pass_fingerprint: fingerprint_column(&row, "pass_hash")?,
            token: SecretString::from(token),
            token_expires_at: expires_at,
        }))
    }

    async fn upsert(&self, record: &CredentialRecord) -> StoreResult<()> {
        let query = format!(
            r#"
            INSERT INTO {} (user_hash, pass_hash, user_token, user_token_expire_dt_tm)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_hash) DO UPDATE SET
                pass_hash = EXCLUDED.pass_hash,
                user_token = EXCLUDED.user_token,
                user_token_expire_dt_tm = EXCLUDED.user_token_expire_dt_tm
            "#,
            self.tables.credentials
        );

        sqlx::query(&query)
            .bind(record.user_fingerprint.as_i64())
            .bind(record.pass_fingerprint.as_i64())
            .bind(record.token.expose_secret())
            .bind(record.token_expires_at)
            .execute(&self.pool)
            .await
            .storage_err()?;

        Ok(())
    }
}

#[async_trait]
impl PreferenceStore for PostgresStore {
    async fn default_vehicle(&self, user: Fingerprint) -> StoreResult<Option<String>> {
        let query = format!(
            "SELECT default_vehicle_id FROM {} WHERE user_hash = $1",
            self.tables.preferences
        );

        let row = sqlx::query(&query)
            .bind(user.as_i64())
            .fetch_optional(&self.pool)
            .await
            .storage_err()?;

        match row {
            Some(row) => row
                .try_get::<Option<String>, _>("default_vehicle_id")
                .storage_err_ctx("default_vehicle_id"),
            None => Ok(None),
        }
    }

    async fn set_default_vehicle(&self, user: Fingerprint, vehicle_id: &str) -> StoreResult<()> {
        let query = format!(
            r#"
            INSERT INTO {} (user_hash, default_vehicle_id)
            VALUES ($1, $2)
            ON CONFLICT (user_hash) DO UPDATE SET
                default_vehicle_id = EXCLUDED.default_vehicle_id
            "#,
            self.tables.preferences
        );

        sqlx::query(&query)
            .bind(user.as_i64())
            .bind(vehicle_id)
            .execute(&self.pool)
            .await
            .storage_err()?;

        Ok(())
    }
}

#[async_trait]
impl ResponseLog for PostgresStore {
    async fn record(&self, response: &ResponseRecord) -> StoreResult<()> {
        let query = format!(
            r#"
            INSERT INTO {} (user_hash, retrieve_dt_tm, endpoint, response_data, vehicle_id)
            VALUES ($1, $2, $3, $4, $5)
            "#,
            self.tables.responses
        );

        sqlx::query(&query)
            .bind(response.user.as_i64())
            .bind(response.retrieved_at)
            .bind(&response.endpoint)
            .bind(&response.data)
            .bind(response.vehicle_id.as_deref())
            .execute(&self.pool)
            .await
            .storage_err()?;

        Ok(())
    }

    async fn recent(
        &self,
        user: Fingerprint,
        endpoint: &str,
        vehicle_id: Option<&str>,
        limit: usize,
    ) -> StoreResult<Vec<ResponseRecord>> {
        let query = format!(
            r#"
            SELECT retrieve_dt_tm, response_data, vehicle_id
            FROM {}
            WHERE user_hash = $1
              AND endpoint = $2
              AND vehicle_id IS NOT DISTINCT FROM $3
            ORDER BY retrieve_dt_tm DESC
            LIMIT $4
            "#,
            self.tables.responses
        );

        let rows = sqlx::query(&query)
            .bind(user.as_i64())
            .bind(endpoint)
            .bind(vehicle_id)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .storage_err()?;

        rows.iter()
            .map(|row| -> StoreResult<ResponseRecord> {
                Ok(ResponseRecord {
                    user,
                    retrieved_at: row.try_get("retrieve_dt_tm").storage_err()?,
                    endpoint: endpoint.to_string(),
                    vehicle_id: row.try_get("vehicle_id").storage_err()?,
                    data: row.try_get("response_data").storage_err()?,
                })
            })
            .collect()
    }
}
