//! PostgreSQL connection pool
//!
//! Connections are opened on demand up to `pool_size` and handed back to
//! an idle list when the [`PooledConnection`] guard drops. Callers beyond
//! `pool_size` wait for a guard to drop instead of failing.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use memstore_core::{BackendKind, StoreError, StoreOperation, StoreResult};
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio_postgres::{Client, Config, Error as PgError, NoTls};

use super::config::PostgresConfig;

/// A pooled PostgreSQL connection with RAII cleanup
pub struct PooledConnection {
    client: Option<Client>,
    idle: Arc<Mutex<Vec<Client>>>,
    active: Arc<AtomicUsize>,
    pool_size: usize,
    // Dropped after the client is back in the idle list
    _permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    /// Get reference to the underlying client
    pub fn client(&self) -> StoreResult<&Client> {
        self.client.as_ref().ok_or_else(released)
    }

    /// Get mutable reference to the underlying client
    pub fn client_mut(&mut self) -> StoreResult<&mut Client> {
        self.client.as_mut().ok_or_else(released)
    }
}

fn released() -> StoreError {
    StoreError::backend(
        BackendKind::Postgres,
        StoreOperation::Connect,
        "Connection already released",
    )
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);

        if let Some(client) = self.client.take() {
            if client.is_closed() {
                return;
            }
            // try_lock keeps Drop non-blocking; on contention the connection is closed instead
            if let Ok(mut idle) = self.idle.try_lock() {
                if idle.len() < self.pool_size {
                    idle.push(client);
                }
            }
        }
    }
}

/// Lazily filled PostgreSQL connection pool
pub struct PostgresPool {
    config: PostgresConfig,
    pg_config: Config,
    idle: Arc<Mutex<Vec<Client>>>,
    active: Arc<AtomicUsize>,
    slots: Arc<Semaphore>,
}

impl PostgresPool {
    /// Validate configuration and prepare the pool without connecting
    pub fn new(config: PostgresConfig) -> StoreResult<Self> {
        config.validate()?;
        let pg_config = Self::build_pg_config(&config);

        Ok(Self {
            pg_config,
            idle: Arc::new(Mutex::new(Vec::new())),
            active: Arc::new(AtomicUsize::new(0)),
            slots: Arc::new(Semaphore::new(config.pool_size)),
            config,
        })
    }

    /// Build tokio_postgres Config
    fn build_pg_config(config: &PostgresConfig) -> Config {
        let mut pg_config = Config::new();
        pg_config
            .host(&config.host)
            .port(config.port)
            .dbname(&config.database)
            .user(&config.user)
            .application_name(&config.application_name)
            .connect_timeout(Duration::from_secs(config.connect_timeout));

        if let Some(ref password) = config.password {
            pg_config.password(password);
        }

        pg_config
    }

    /// Sanitize PostgreSQL errors for security
    pub fn sanitize_error(error: &PgError) -> String {
        let message = error.to_string();
        if error.as_db_error().is_some() {
            "Database operation failed".to_string()
        } else if message.contains("authentication") || message.contains("password") {
            "Authentication failed".to_string()
        } else if message.contains("timeout") || message.contains("timed out") {
            "Operation timed out".to_string()
        } else if error.is_closed() || message.contains("connect") {
            "Connection failed".to_string()
        } else {
            "Database error occurred".to_string()
        }
    }

    /// Map a driver error, logging the unsanitized cause
    pub fn to_store_error(error: &PgError, operation: StoreOperation) -> StoreError {
        tracing::error!(operation = %operation, error = %error, "PostgreSQL query failed");
        StoreError::backend(BackendKind::Postgres, operation, Self::sanitize_error(error))
    }

    /// Number of connections currently checked out
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Acquire a connection from the pool, waiting while all `pool_size`
    /// connections are checked out
    pub async fn acquire(&self) -> StoreResult<PooledConnection> {
        let permit = Arc::clone(&self.slots).acquire_owned().await.map_err(|_| {
            StoreError::backend(
                BackendKind::Postgres,
                StoreOperation::Connect,
                "Connection pool closed",
            )
        })?;
        self.active.fetch_add(1, Ordering::SeqCst);

        // From here the guard owns the slot, so every early return releases it
        let mut guard = PooledConnection {
            client: None,
            idle: Arc::clone(&self.idle),
            active: Arc::clone(&self.active),
            pool_size: self.config.pool_size,
            _permit: permit,
        };

        let reusable = {
            let mut idle = self.idle.lock().await;
            let mut found = None;
            while let Some(client) = idle.pop() {
                if !client.is_closed() {
                    found = Some(client);
                    break;
                }
            }
            found
        };

        guard.client = Some(match reusable {
            Some(client) => client,
            None => self.connect().await?,
        });
        Ok(guard)
    }

    async fn connect(&self) -> StoreResult<Client> {
        let (client, connection) = self
            .pg_config
            .connect(NoTls)
            .await
            .map_err(|e| Self::to_store_error(&e, StoreOperation::Connect))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(error = %e, "PostgreSQL connection error");
            }
        });

        client
            .query_one("SELECT 1", &[])
            .await
            .map_err(|e| Self::to_store_error(&e, StoreOperation::Connect))?;

        tracing::debug!(host = %self.config.host, database = %self.config.database, "Opened PostgreSQL connection");
        Ok(client)
    }
}
