//! Redis connector built on a deadpool connection pool

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_redis::{Connection as PooledConnection, Pool};
use memstore_core::{
    BackendKind, MemoryRecord, Namespace, RecordKey, RecordScope, SearchPrefix, SetupGuard,
    StoreConnector, StoreError, StoreHandle, StoreOperation, StoreResult, TenantId, TtlConfig,
};
use tracing::{debug, info, warn};

use super::config::RedisConfig;
use super::layout::{FIELD_CONTENT, FIELD_CREATED_AT, FIELD_UPDATED_AT, KeyLayout, LAYOUT_VERSION};
use super::pool::RedisPoolUtils;

/// Drop an index entry whose hash has expired, then the namespace once its
/// index is empty. Runs atomically so a concurrent put is never unindexed.
const PRUNE_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 0 then
    redis.call('SREM', KEYS[2], ARGV[1])
end
if redis.call('SCARD', KEYS[2]) == 0 then
    redis.call('SREM', KEYS[3], ARGV[2])
end
return 1
"#;

/// Connector for a standalone Redis server
pub struct RedisConnector {
    config: RedisConfig,
    pool: Pool,
    layout: KeyLayout,
    setup: SetupGuard,
}

impl RedisConnector {
    /// Build the pool from configuration. Connections are opened lazily.
    pub fn new(config: RedisConfig) -> StoreResult<Self> {
        let pool = RedisPoolUtils::create_pool(&config)?;
        let layout = KeyLayout::new(config.key_prefix.clone());

        Ok(Self {
            config,
            pool,
            layout,
            setup: SetupGuard::new(),
        })
    }

    pub fn config(&self) -> &RedisConfig {
        &self.config
    }

    async fn run_setup(&self) -> StoreResult<()> {
        let mut conn = RedisPoolUtils::get_connection(&self.pool, StoreOperation::Connect)
            .await
            .map_err(|e| StoreError::setup(BackendKind::Redis, e.to_string()))?;
        let setup_error = |e: redis::RedisError| {
            StoreError::setup(BackendKind::Redis, RedisPoolUtils::sanitize_error(&e))
        };

        let _: String = redis::cmd("PING")
            .query_async(&mut *conn)
            .await
            .map_err(setup_error)?;

        let version_key = self.layout.version_key();
        let _: Option<String> = redis::cmd("SET")
            .arg(&version_key)
            .arg(LAYOUT_VERSION)
            .arg("NX")
            .query_async(&mut *conn)
            .await
            .map_err(setup_error)?;

        let stored: Option<String> = redis::cmd("GET")
            .arg(&version_key)
            .query_async(&mut *conn)
            .await
            .map_err(setup_error)?;
        if stored.as_deref() != Some(LAYOUT_VERSION) {
            return Err(StoreError::setup(
                BackendKind::Redis,
                format!(
                    "Unsupported key layout version {:?} under prefix '{}'",
                    stored, self.config.key_prefix
                ),
            ));
        }

        info!(
            host = %self.config.host,
            port = self.config.port,
            prefix = %self.config.key_prefix,
            "Redis store ready"
        );
        Ok(())
    }
}

#[async_trait]
impl StoreConnector for RedisConnector {
    fn backend(&self) -> BackendKind {
        BackendKind::Redis
    }

    async fn ensure_setup(&self) -> StoreResult<()> {
        self.setup.run(|| self.run_setup()).await
    }

    async fn scoped_store(&self, ttl: Option<TtlConfig>) -> StoreResult<Box<dyn StoreHandle>> {
        self.ensure_setup().await?;
        let conn = RedisPoolUtils::get_connection(&self.pool, StoreOperation::Connect).await?;
        debug!(ttl = ?ttl, "Acquired Redis store handle");

        Ok(Box::new(RedisHandle {
            conn,
            layout: self.layout.clone(),
            ttl,
        }))
    }
}

/// One pooled connection; returned to the pool on drop
struct RedisHandle {
    conn: PooledConnection,
    layout: KeyLayout,
    ttl: Option<TtlConfig>,
}

impl RedisHandle {
    /// Server clock as RFC3339, so timestamps never depend on the caller's clock
    async fn server_time(&mut self) -> StoreResult<String> {
        let (secs, micros): (i64, u32) = redis::cmd("TIME")
            .query_async(&mut *self.conn)
            .await
            .map_err(|e| RedisPoolUtils::to_store_error(&e, StoreOperation::Put))?;

        DateTime::<Utc>::from_timestamp(secs, micros.saturating_mul(1_000))
            .map(|ts| ts.to_rfc3339())
            .ok_or_else(|| {
                StoreError::backend(BackendKind::Redis, StoreOperation::Put, "Invalid server time")
            })
    }

    async fn load_records(
        &mut self,
        tenant: &TenantId,
        namespace: &Namespace,
    ) -> StoreResult<Vec<MemoryRecord>> {
        let index_key = self.layout.index_key(tenant, namespace);
        let keys: Vec<String> = redis::cmd("SMEMBERS")
            .arg(&index_key)
            .query_async(&mut *self.conn)
            .await
            .map_err(|e| RedisPoolUtils::to_store_error(&e, StoreOperation::Search))?;
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let scope = RecordScope::new(tenant.clone(), namespace.clone());
        let keys: Vec<RecordKey> = keys
            .into_iter()
            .filter_map(|raw| match RecordKey::parse(&raw) {
                Ok(key) => Some(key),
                Err(e) => {
                    warn!(index = %index_key, key = %raw, error = %e, "Skipping malformed index entry");
                    None
                }
            })
            .collect();

        let mut pipe = redis::pipe();
        for key in &keys {
            pipe.cmd("HGETALL").arg(self.layout.record_key(&scope, key));
        }
        let hashes: Vec<HashMap<String, String>> = pipe
            .query_async(&mut *self.conn)
            .await
            .map_err(|e| RedisPoolUtils::to_store_error(&e, StoreOperation::Search))?;

        let mut records = Vec::new();
        let mut expired = Vec::new();
        for (key, fields) in keys.into_iter().zip(hashes) {
            if fields.is_empty() {
                expired.push(key);
                continue;
            }
            records.push(parse_record(namespace.clone(), key, fields, StoreOperation::Search)?);
        }

        if !expired.is_empty() {
            self.prune_expired(&scope, &expired).await?;
        }
        Ok(records)
    }

    async fn prune_expired(
        &mut self,
        scope: &RecordScope,
        expired: &[RecordKey],
    ) -> StoreResult<()> {
        let script = redis::Script::new(PRUNE_SCRIPT);
        let index_key = self.layout.index_key(&scope.tenant, &scope.namespace);
        let namespaces_key = self.layout.namespaces_key(&scope.tenant);

        for key in expired {
            let _: i64 = script
                .key(self.layout.record_key(scope, key))
                .key(&index_key)
                .key(&namespaces_key)
                .arg(key.as_str())
                .arg(scope.namespace.as_str())
                .invoke_async(&mut *self.conn)
                .await
                .map_err(|e| RedisPoolUtils::to_store_error(&e, StoreOperation::Search))?;
        }
        debug!(index = %index_key, pruned = expired.len(), "Pruned expired index entries");
        Ok(())
    }
}

#[async_trait]
impl StoreHandle for RedisHandle {
    async fn search(&mut self, prefix: &SearchPrefix) -> StoreResult<Vec<MemoryRecord>> {
        let namespaces = match &prefix.namespace {
            Some(namespace) => vec![namespace.clone()],
            None => {
                let raw: Vec<String> = redis::cmd("SMEMBERS")
                    .arg(self.layout.namespaces_key(&prefix.tenant))
                    .query_async(&mut *self.conn)
                    .await
                    .map_err(|e| RedisPoolUtils::to_store_error(&e, StoreOperation::Search))?;
                raw.iter().filter_map(|ns| Namespace::parse(ns).ok()).collect()
            }
        };

        let mut records = Vec::new();
        for namespace in &namespaces {
            records.extend(self.load_records(&prefix.tenant, namespace).await?);
        }
        Ok(records)
    }

    async fn get(
        &mut self,
        scope: &RecordScope,
        key: &RecordKey,
    ) -> StoreResult<Option<MemoryRecord>> {
        let fields: HashMap<String, String> = redis::cmd("HGETALL")
            .arg(self.layout.record_key(scope, key))
            .query_async(&mut *self.conn)
            .await
            .map_err(|e| RedisPoolUtils::to_store_error(&e, StoreOperation::Get))?;

        if fields.is_empty() {
            return Ok(None);
        }
        parse_record(scope.namespace.clone(), key.clone(), fields, StoreOperation::Get).map(Some)
    }

    async fn put(&mut self, scope: &RecordScope, key: &RecordKey, content: &str) -> StoreResult<()> {
        let now = self.server_time().await?;
        let record_key = self.layout.record_key(scope, key);

        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("HSETNX")
            .arg(&record_key)
            .arg(FIELD_CREATED_AT)
            .arg(&now)
            .ignore()
            .cmd("HSET")
            .arg(&record_key)
            .arg(FIELD_CONTENT)
            .arg(content)
            .arg(FIELD_UPDATED_AT)
            .arg(&now)
            .ignore()
            .cmd("SADD")
            .arg(self.layout.index_key(&scope.tenant, &scope.namespace))
            .arg(key.as_str())
            .ignore()
            .cmd("SADD")
            .arg(self.layout.namespaces_key(&scope.tenant))
            .arg(scope.namespace.as_str())
            .ignore();
        match self.ttl {
            Some(ttl) => pipe.cmd("EXPIRE").arg(&record_key).arg(ttl.as_secs()).ignore(),
            // An overwrite without TTL clears any earlier expiry
            None => pipe.cmd("PERSIST").arg(&record_key).ignore(),
        };

        let () = pipe
            .query_async(&mut *self.conn)
            .await
            .map_err(|e| RedisPoolUtils::to_store_error(&e, StoreOperation::Put))?;
        Ok(())
    }
}

fn parse_record(
    namespace: Namespace,
    key: RecordKey,
    mut fields: HashMap<String, String>,
    operation: StoreOperation,
) -> StoreResult<MemoryRecord> {
    let mut timestamp = |field: &str| -> StoreResult<DateTime<Utc>> {
        let raw = fields.remove(field).ok_or_else(|| {
            StoreError::backend(
                BackendKind::Redis,
                operation,
                format!("Record '{}/{}' is missing field '{}'", namespace, key, field),
            )
        })?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(|_| {
                StoreError::backend(
                    BackendKind::Redis,
                    operation,
                    format!("Record '{}/{}' has a malformed '{}'", namespace, key, field),
                )
            })
    };

    let created_at = timestamp(FIELD_CREATED_AT)?;
    let updated_at = timestamp(FIELD_UPDATED_AT)?;
    let content = fields.remove(FIELD_CONTENT).unwrap_or_default();

    Ok(MemoryRecord {
        namespace,
        key,
        content,
        created_at,
        updated_at,
    })
}
