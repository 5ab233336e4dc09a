//! PostgreSQL migration engine for schema versioning

use memstore_core::{BackendKind, StoreError, StoreResult};
use tracing::info;

use super::pool::PostgresPool;

const MIGRATIONS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS memstore_migrations (
        version INTEGER PRIMARY KEY,
        description TEXT NOT NULL,
        applied_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
    );
"#;

/// A PostgreSQL database migration
#[derive(Debug, Clone)]
pub struct PostgresMigration {
    pub version: u32,
    pub description: &'static str,
    pub up_sql: &'static str,
}

/// Applies pending migrations in version order
pub struct PostgresMigrationEngine {
    migrations: Vec<PostgresMigration>,
}

impl PostgresMigrationEngine {
    pub fn new() -> Self {
        Self {
            migrations: Self::default_migrations(),
        }
    }

    fn default_migrations() -> Vec<PostgresMigration> {
        vec![
            PostgresMigration {
                version: 1,
                description: "Memory records table",
                up_sql: r#"
                    CREATE TABLE IF NOT EXISTS memory_records (
                        user_id TEXT NOT NULL,
                        namespace TEXT NOT NULL,
                        key TEXT NOT NULL,
                        content TEXT NOT NULL,
                        created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                        updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                        PRIMARY KEY (user_id, namespace, key)
                    );
                "#,
            },
            PostgresMigration {
                version: 2,
                description: "Record expiry",
                up_sql: r#"
                    ALTER TABLE memory_records
                        ADD COLUMN IF NOT EXISTS expires_at TIMESTAMP WITH TIME ZONE;
                    CREATE INDEX IF NOT EXISTS idx_memory_records_expires_at
                        ON memory_records (expires_at)
                        WHERE expires_at IS NOT NULL;
                "#,
            },
        ]
    }

    /// Latest known schema version
    pub fn latest_version(&self) -> u32 {
        self.migrations.iter().map(|m| m.version).max().unwrap_or(0)
    }

    pub async fn migrate(&self, pool: &PostgresPool) -> StoreResult<()> {
        let mut conn = pool.acquire().await?;
        let client = conn.client_mut()?;

        client
            .batch_execute(MIGRATIONS_TABLE)
            .await
            .map_err(|e| migration_error("Failed to create migrations table", &e))?;

        let current_version: i32 = client
            .query_one(
                "SELECT COALESCE(MAX(version), 0) FROM memstore_migrations",
                &[],
            )
            .await
            .map(|row| row.get(0))
            .map_err(|e| migration_error("Failed to read schema version", &e))?;

        for migration in &self.migrations {
            let version = migration.version as i32;
            if version <= current_version {
                continue;
            }

            let tx = client
                .transaction()
                .await
                .map_err(|e| migration_error("Failed to start migration transaction", &e))?;

            tx.batch_execute(migration.up_sql)
                .await
                .map_err(|e| migration_error(&format!("Migration {} failed", version), &e))?;

            tx.execute(
                "INSERT INTO memstore_migrations (version, description) VALUES ($1, $2)",
                &[&version, &migration.description],
            )
            .await
            .map_err(|e| migration_error(&format!("Failed to record migration {}", version), &e))?;

            tx.commit()
                .await
                .map_err(|e| migration_error(&format!("Failed to commit migration {}", version), &e))?;

            info!(version, description = migration.description, "Applied PostgreSQL migration");
        }

        Ok(())
    }
}

impl Default for PostgresMigrationEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn migration_error(context: &str, error: &tokio_postgres::Error) -> StoreError {
    tracing::error!(error = %error, "{}", context);
    StoreError::setup(
        BackendKind::Postgres,
        format!("{}: {}", context, PostgresPool::sanitize_error(error)),
    )
}
