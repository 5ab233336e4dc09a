//! Conformance tests against live services.
//!
//! Ignored by default. Start the services and run:
//!
//! ```text
//! cargo test -p memstore-backends --test live_backends -- --ignored
//! ```
//!
//! Connection parameters come from the same variables the server reads
//! (`REDIS_HOST`, `POSTGRES_HOST`, `MONGODB_URI`, ...), falling back to defaults.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use memstore_backends::{BackendSettings, MongoConfig, PostgresConfig, RedisConfig, select};
use memstore_core::{
    AccessPolicy, MemoryStore, Namespace, RecordKey, RecordScope, SearchPrefix, StoreConnector,
    StoreErrorKind, TenantId, TtlConfig,
};
use serial_test::serial;

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn settings() -> BackendSettings {
    BackendSettings {
        redis: RedisConfig {
            host: env_or("REDIS_HOST", "localhost"),
            port: env_or("REDIS_PORT", "6379").parse().unwrap(),
            key_prefix: "memstore-test".to_string(),
            ..Default::default()
        }
        .with_password(env_or("REDIS_PASSWORD", "")),
        postgres: PostgresConfig {
            host: env_or("POSTGRES_HOST", "localhost"),
            port: env_or("POSTGRES_PORT", "5432").parse().unwrap(),
            user: env_or("POSTGRES_USER", "postgres"),
            database: env_or("POSTGRES_DB", "memstore"),
            ..Default::default()
        }
        .with_password(env_or("POSTGRES_PASSWORD", "")),
        mongodb: MongoConfig {
            uri: env_or("MONGODB_URI", "mongodb://localhost:27017"),
            database: "memstore_test".to_string(),
            ..Default::default()
        },
    }
}

/// Fresh tenant per run so tests never see each other's records
fn unique_tenant() -> TenantId {
    TenantId::parse(format!("t-{}", uuid::Uuid::new_v4().simple())).unwrap()
}

async fn run_conformance(backend: &str) {
    let connector = select(backend, &settings()).unwrap();
    connector.ensure_setup().await.unwrap();
    connector.ensure_setup().await.unwrap();

    let store = MemoryStore::new(
        Arc::clone(&connector),
        AccessPolicy::from_csv("", "prefs/locked"),
        unique_tenant(),
    );

    // Round trip and authoritative timestamps
    let written = store.put_memory("prefs", "tone", "concise").await.unwrap();
    let created_at = written.created_at.unwrap();
    assert_eq!(store.get_memory("prefs", "tone").await.unwrap().content, "concise");

    tokio::time::sleep(Duration::from_millis(20)).await;
    let edited = store.update_memory("prefs", "tone", "direct").await.unwrap();
    assert_eq!(edited.created_at, Some(created_at));
    assert!(edited.updated_at.unwrap() >= created_at);
    assert_eq!(store.get_memory("prefs", "tone").await.unwrap().content, "direct");

    // Update on a missing key writes nothing
    let err = store.update_memory("prefs", "missing", "x").await.unwrap_err();
    assert_eq!(err.kind(), StoreErrorKind::RecordNotFound);
    let err = store.get_memory("prefs", "missing").await.unwrap_err();
    assert_eq!(err.kind(), StoreErrorKind::RecordNotFound);

    // Content is stored verbatim
    let tricky = "$where: {\"a\": 1} -- '; DROP TABLE x; \u{1F600}";
    store.put_memory("prefs", "tricky", tricky).await.unwrap();
    assert_eq!(store.get_memory("prefs", "tricky").await.unwrap().content, tricky);

    // Listings
    store.put_memory("code", "rust-style", "x").await.unwrap();
    let namespaces = store.list_namespaces().await.unwrap();
    let summary: Vec<_> = namespaces.iter().map(|n| (n.name.as_str(), n.file_count)).collect();
    assert_eq!(summary, vec![("code", 1), ("prefs", 2)]);

    let keys: Vec<_> = store
        .list_memories("prefs")
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.key)
        .collect();
    assert_eq!(keys, vec!["tone", "tricky"]);

    // Read-only protection
    let err = store.put_memory("prefs", "locked", "x").await.unwrap_err();
    assert_eq!(err.kind(), StoreErrorKind::ReadOnlyViolation);
}

async fn run_ttl(backend: &str) {
    let connector = select(backend, &settings()).unwrap();
    let tenant = unique_tenant();
    let scope = RecordScope::new(tenant.clone(), Namespace::parse("ttl").unwrap());
    let key = RecordKey::parse("short").unwrap();

    let mut handle = connector
        .scoped_store(Some(TtlConfig {
            default_ttl: Duration::from_secs(1),
        }))
        .await
        .unwrap();
    handle.put(&scope, &key, "soon gone").await.unwrap();
    assert!(handle.get(&scope, &key).await.unwrap().is_some());

    // A later write without TTL clears the expiry
    let kept = RecordKey::parse("kept").unwrap();
    handle.put(&scope, &kept, "expiring").await.unwrap();
    let mut persistent = connector.scoped_store(None).await.unwrap();
    persistent.put(&scope, &kept, "forever").await.unwrap();

    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert!(handle.get(&scope, &key).await.unwrap().is_none());
    let survivors = handle.search(&SearchPrefix::tenant(tenant)).await.unwrap();
    assert_eq!(survivors.len(), 1);
    assert_eq!(survivors[0].key.as_str(), "kept");
    assert_eq!(survivors[0].content, "forever");
}

async fn run_pool_burst(backend: &str, settings: BackendSettings) {
    let connector: Arc<dyn StoreConnector> = select(backend, &settings).unwrap();
    let store = MemoryStore::new(connector, AccessPolicy::permissive(), unique_tenant());

    let results = join_all((0..16).map(|i| {
        let store = &store;
        async move { store.put_memory("burst", &format!("k{i}"), "v").await }
    }))
    .await;
    for result in results {
        result.unwrap();
    }
    assert_eq!(store.list_memories("burst").await.unwrap().len(), 16);
}

async fn run_concurrent_puts(backend: &str) {
    let connector: Arc<dyn StoreConnector> = select(backend, &settings()).unwrap();
    let store = MemoryStore::new(connector, AccessPolicy::permissive(), unique_tenant());

    let (a, b) = tokio::join!(
        store.put_memory("race", "key", "first"),
        store.put_memory("race", "key", "second"),
    );
    a.unwrap();
    b.unwrap();

    let content = store.get_memory("race", "key").await.unwrap().content;
    assert!(content == "first" || content == "second");
    assert_eq!(store.list_memories("race").await.unwrap().len(), 1);
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
#[serial]
async fn redis_conformance() {
    run_conformance("redis").await;
    run_concurrent_puts("redis").await;
    run_ttl("redis").await;
    run_pool_burst("redis", settings()).await;
}

#[cfg(feature = "redis")]
#[tokio::test]
#[ignore = "requires a running Redis server"]
#[serial]
async fn redis_prunes_expired_index_entries() {
    let settings = settings();
    let connector = select("redis", &settings).unwrap();
    let tenant = unique_tenant();
    let scope = RecordScope::new(tenant.clone(), Namespace::parse("ttl").unwrap());

    let mut handle = connector
        .scoped_store(Some(TtlConfig {
            default_ttl: Duration::from_secs(1),
        }))
        .await
        .unwrap();
    handle.put(&scope, &RecordKey::parse("short").unwrap(), "x").await.unwrap();

    tokio::time::sleep(Duration::from_millis(2500)).await;
    let live = handle.search(&SearchPrefix::tenant(tenant.clone())).await.unwrap();
    assert!(live.is_empty());

    let client = redis::Client::open(settings.redis.url()).unwrap();
    let mut conn = client.get_multiplexed_async_connection().await.unwrap();
    let prefix = &settings.redis.key_prefix;

    let indexed: usize = redis::cmd("SCARD")
        .arg(format!("{prefix}:idx:{tenant}:ttl"))
        .query_async(&mut conn)
        .await
        .unwrap();
    let namespaces: usize = redis::cmd("SCARD")
        .arg(format!("{prefix}:ns:{tenant}"))
        .query_async(&mut conn)
        .await
        .unwrap();
    assert_eq!(indexed, 0);
    assert_eq!(namespaces, 0);
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL server"]
#[serial]
async fn postgres_conformance() {
    run_conformance("postgresql").await;
    run_concurrent_puts("postgresql").await;
    run_ttl("postgresql").await;

    let mut small_pool = settings();
    small_pool.postgres.pool_size = 4;
    run_pool_burst("postgresql", small_pool).await;
}

#[tokio::test]
#[ignore = "requires a running MongoDB server"]
#[serial]
async fn mongodb_conformance() {
    run_conformance("mongodb").await;
    run_concurrent_puts("mongodb").await;
    run_ttl("mongodb").await;
}
