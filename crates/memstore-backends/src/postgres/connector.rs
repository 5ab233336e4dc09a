//! PostgreSQL connector

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use memstore_core::{
    BackendKind, MemoryRecord, Namespace, RecordKey, RecordScope, SearchPrefix, SetupGuard,
    StoreConnector, StoreError, StoreHandle, StoreOperation, StoreResult, TtlConfig,
};
use tokio_postgres::Row;
use tracing::{debug, info};

use super::config::PostgresConfig;
use super::migrations::PostgresMigrationEngine;
use super::pool::{PooledConnection, PostgresPool};

const SEARCH_SQL: &str = r#"
    SELECT namespace, key, content, created_at, updated_at
    FROM memory_records
    WHERE user_id = $1
      AND ($2::TEXT IS NULL OR namespace = $2)
      AND (expires_at IS NULL OR expires_at > NOW())
"#;

const GET_SQL: &str = r#"
    SELECT namespace, key, content, created_at, updated_at
    FROM memory_records
    WHERE user_id = $1 AND namespace = $2 AND key = $3
      AND (expires_at IS NULL OR expires_at > NOW())
"#;

// An expired row that is overwritten starts a new lifetime
const UPSERT_SQL: &str = r#"
    INSERT INTO memory_records
        (user_id, namespace, key, content, created_at, updated_at, expires_at)
    VALUES ($1, $2, $3, $4, NOW(), NOW(), NOW() + $5::FLOAT8 * INTERVAL '1 second')
    ON CONFLICT (user_id, namespace, key) DO UPDATE SET
        content = EXCLUDED.content,
        updated_at = NOW(),
        expires_at = EXCLUDED.expires_at,
        created_at = CASE
            WHEN memory_records.expires_at IS NOT NULL AND memory_records.expires_at <= NOW()
                THEN NOW()
            ELSE memory_records.created_at
        END
"#;

/// Connector for a PostgreSQL database
pub struct PostgresConnector {
    pool: PostgresPool,
    migrations: PostgresMigrationEngine,
    setup: SetupGuard,
}

impl PostgresConnector {
    /// Prepare the pool. Nothing connects until setup or first use.
    pub fn new(config: PostgresConfig) -> StoreResult<Self> {
        Ok(Self {
            pool: PostgresPool::new(config)?,
            migrations: PostgresMigrationEngine::new(),
            setup: SetupGuard::new(),
        })
    }

    pub fn pool(&self) -> &PostgresPool {
        &self.pool
    }
}

#[async_trait]
impl StoreConnector for PostgresConnector {
    fn backend(&self) -> BackendKind {
        BackendKind::Postgres
    }

    async fn ensure_setup(&self) -> StoreResult<()> {
        self.setup
            .run(|| async {
                self.migrations.migrate(&self.pool).await.map_err(|e| match e {
                    StoreError::Backend { reason, .. } => {
                        StoreError::setup(BackendKind::Postgres, reason)
                    }
                    other => other,
                })?;
                info!(
                    schema_version = self.migrations.latest_version(),
                    "PostgreSQL store ready"
                );
                Ok(())
            })
            .await
    }

    async fn scoped_store(&self, ttl: Option<TtlConfig>) -> StoreResult<Box<dyn StoreHandle>> {
        self.ensure_setup().await?;
        let conn = self.pool.acquire().await?;
        debug!(
            active = self.pool.active_connections(),
            "Acquired PostgreSQL store handle"
        );
        Ok(Box::new(PostgresHandle { conn, ttl }))
    }
}

struct PostgresHandle {
    conn: PooledConnection,
    ttl: Option<TtlConfig>,
}

#[async_trait]
impl StoreHandle for PostgresHandle {
    async fn search(&mut self, prefix: &SearchPrefix) -> StoreResult<Vec<MemoryRecord>> {
        let namespace = prefix.namespace.as_ref().map(Namespace::as_str);
        let rows = self
            .conn
            .client()?
            .query(SEARCH_SQL, &[&prefix.tenant.as_str(), &namespace])
            .await
            .map_err(|e| PostgresPool::to_store_error(&e, StoreOperation::Search))?;

        rows.iter()
            .map(|row| row_to_record(row, StoreOperation::Search))
            .collect()
    }

    async fn get(
        &mut self,
        scope: &RecordScope,
        key: &RecordKey,
    ) -> StoreResult<Option<MemoryRecord>> {
        let row = self
            .conn
            .client()?
            .query_opt(
                GET_SQL,
                &[&scope.tenant.as_str(), &scope.namespace.as_str(), &key.as_str()],
            )
            .await
            .map_err(|e| PostgresPool::to_store_error(&e, StoreOperation::Get))?;

        row.map(|row| row_to_record(&row, StoreOperation::Get))
            .transpose()
    }

    async fn put(&mut self, scope: &RecordScope, key: &RecordKey, content: &str) -> StoreResult<()> {
        let ttl_secs: Option<f64> = self.ttl.map(|ttl| ttl.default_ttl.as_secs_f64());
        self.conn
            .client()?
            .execute(
                UPSERT_SQL,
                &[
                    &scope.tenant.as_str(),
                    &scope.namespace.as_str(),
                    &key.as_str(),
                    &content,
                    &ttl_secs,
                ],
            )
            .await
            .map_err(|e| PostgresPool::to_store_error(&e, StoreOperation::Put))?;
        Ok(())
    }
}

fn row_to_record(row: &Row, operation: StoreOperation) -> StoreResult<MemoryRecord> {
    let corrupt = |reason: String| StoreError::backend(BackendKind::Postgres, operation, reason);

    let namespace: String = row.try_get("namespace").map_err(|e| corrupt(e.to_string()))?;
    let key: String = row.try_get("key").map_err(|e| corrupt(e.to_string()))?;
    let content: String = row.try_get("content").map_err(|e| corrupt(e.to_string()))?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(|e| corrupt(e.to_string()))?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(|e| corrupt(e.to_string()))?;

    Ok(MemoryRecord {
        namespace: Namespace::parse(&namespace).map_err(|e| corrupt(e.to_string()))?,
        key: RecordKey::parse(&key).map_err(|e| corrupt(e.to_string()))?,
        content,
        created_at,
        updated_at,
    })
}
