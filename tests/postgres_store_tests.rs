//! PostgreSQL store tests
//!
//! Requires a disposable database. Each test uses its own schema-qualified
//! tables so runs do not interfere.
//!
//! Run: SPARK_DATABASE_URL=postgres://... cargo test --test postgres_store_tests -- --ignored

#![cfg(feature = "postgres")]

use std::sync::Arc;

use chrono::{Duration, Utc};
use secrecy::ExposeSecret;
use serde_json::json;
use spark_auth::store::TableNames;
use spark_auth::{
    AuthCache, CredentialRecord, CredentialStore, PostgresStore, PreferenceStore, ResponseLog,
    ResponseRecord, StaticProvider, TokenResult, fingerprint,
};

async fn store(suffix: &str) -> PostgresStore {
    let url = std::env::var("SPARK_DATABASE_URL").expect("SPARK_DATABASE_URL");
    let tables = TableNames {
        credentials: format!("auth_data_{}", suffix),
        preferences: format!("user_preferences_{}", suffix),
        responses: format!("response_data_{}", suffix),
    };
    let store = PostgresStore::connect(&url)
        .await
        .unwrap()
        .with_tables(tables)
        .unwrap();
    store.migrate().await.unwrap();
    store
}

#[tokio::test]
#[ignore = "Requires SPARK_DATABASE_URL"]
async fn test_migrate_is_repeatable() {
    let store = store("migrate").await;
    store.migrate().await.unwrap();
}

#[tokio::test]
#[ignore = "Requires SPARK_DATABASE_URL"]
async fn test_upsert_and_get() {
    let store = store("upsert").await;
    let user = fingerprint(&format!("alice-{}", Utc::now().timestamp_nanos_opt().unwrap()));

    assert!(store.get(user).await.unwrap().is_none());

    let t1 = TokenResult::expiring_in("Bearer T1", Duration::hours(1));
    let rec = CredentialRecord::new(user, fingerprint("secret"), &t1);
    store.upsert(&rec).await.unwrap();
    store.upsert(&rec).await.unwrap();

    let loaded = store.get(user).await.unwrap().unwrap();
    assert_eq!(loaded.pass_fingerprint, fingerprint("secret"));
    assert_eq!(loaded.token.expose_secret(), "Bearer T1");
    assert_eq!(loaded.token_expires_at, t1.expires_at);

    let t2 = TokenResult::expiring_in("Bearer T2", Duration::hours(2));
    store
        .upsert(&CredentialRecord::new(user, fingerprint("changed"), &t2))
        .await
        .unwrap();

    let loaded = store.get(user).await.unwrap().unwrap();
    assert_eq!(loaded.pass_fingerprint, fingerprint("changed"));
    assert_eq!(loaded.token.expose_secret(), "Bearer T2");
}

#[tokio::test]
#[ignore = "Requires SPARK_DATABASE_URL"]
async fn test_high_fingerprints_round_trip() {
    let store = store("range").await;
    // Above i32::MAX; must survive the BIGINT column unchanged.
    let user = fingerprint("héllo");
    assert!(user.value() > i32::MAX as u32);

    let token = TokenResult::expiring_in("Bearer x", Duration::hours(1));
    store
        .upsert(&CredentialRecord::new(user, fingerprint("🚗"), &token))
        .await
        .unwrap();

    let loaded = store.get(user).await.unwrap().unwrap();
    assert_eq!(loaded.user_fingerprint, user);
    assert_eq!(loaded.pass_fingerprint, fingerprint("🚗"));
}

#[tokio::test]
#[ignore = "Requires SPARK_DATABASE_URL"]
async fn test_cache_over_postgres() {
    let store = Arc::new(store("cache").await);
    let username = format!("bob-{}", Utc::now().timestamp_nanos_opt().unwrap());
    let cache = AuthCache::new(
        store.clone(),
        Arc::new(StaticProvider::new("Bearer live", Duration::hours(1))),
    );

    let first = cache.attempt(&username, "secret").await.unwrap();
    let second = cache.attempt(&username, "secret").await.unwrap();
    assert_eq!(first.token.expose_secret(), second.token.expose_secret());
    assert_eq!(first.expires_at, second.expires_at);

    let record = store.get(fingerprint(&username)).await.unwrap().unwrap();
    assert_eq!(record.token.expose_secret(), "Bearer live");
}

#[tokio::test]
#[ignore = "Requires SPARK_DATABASE_URL"]
async fn test_preferences() {
    let store = store("prefs").await;
    let user = fingerprint(&format!("carol-{}", Utc::now().timestamp_nanos_opt().unwrap()));

    assert!(store.default_vehicle(user).await.unwrap().is_none());
    store.set_default_vehicle(user, "veh-1").await.unwrap();
    store.set_default_vehicle(user, "veh-2").await.unwrap();
    assert_eq!(
        store.default_vehicle(user).await.unwrap().as_deref(),
        Some("veh-2")
    );
}

#[tokio::test]
#[ignore = "Requires SPARK_DATABASE_URL"]
async fn test_response_history() {
    let store = store("responses").await;
    let user = fingerprint(&format!("dave-{}", Utc::now().timestamp_nanos_opt().unwrap()));
    let now = Utc::now();

    for i in 0..3i64 {
        let r = ResponseRecord::new(user, "vehicle_health", json!({ "seq": i }))
            .with_vehicle("veh-1")
            .retrieved_at(now - Duration::minutes(10 - i));
        store.record(&r).await.unwrap();
    }
    store
        .record(&ResponseRecord::new(user, "vehicle_health", json!({ "seq": 99 })))
        .await
        .unwrap();

    let recent = store
        .recent(user, "vehicle_health", Some("veh-1"), 2)
        .await
        .unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].data["seq"], 2);
    assert_eq!(recent[1].data["seq"], 1);
    assert!(recent.iter().all(|r| r.vehicle_id.as_deref() == Some("veh-1")));

    let untied = store
        .recent(user, "vehicle_health", None, 10)
        .await
        .unwrap();
    assert_eq!(untied.len(), 1);
    assert_eq!(untied[0].data["seq"], 99);
}
