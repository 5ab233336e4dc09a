//! Redis connection pool helpers

use deadpool_redis::{
    Config as PoolConfig, Connection as PooledConnection, Pool, PoolConfig as PoolSizing, Runtime,
};
use memstore_core::{BackendKind, StoreError, StoreOperation, StoreResult};
use redis::{ErrorKind as RedisErrorKind, RedisError};

use super::config::RedisConfig;

/// Redis connection pool utility functions
pub struct RedisPoolUtils;

impl RedisPoolUtils {
    /// Create the pool. No connection is opened until first use.
    pub fn create_pool(config: &RedisConfig) -> StoreResult<Pool> {
        config.validate()?;

        let mut pool_config = PoolConfig::from_url(config.url());
        pool_config.pool = Some(PoolSizing::new(config.pool_size));
        pool_config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| {
                StoreError::setup(
                    BackendKind::Redis,
                    format!("Failed to create connection pool: {}", e),
                )
            })
    }

    /// Get a pooled connection
    pub async fn get_connection(
        pool: &Pool,
        operation: StoreOperation,
    ) -> StoreResult<PooledConnection> {
        pool.get().await.map_err(|e| {
            tracing::error!(operation = %operation, error = %e, "Failed to get Redis connection from pool");
            StoreError::backend(
                BackendKind::Redis,
                StoreOperation::Connect,
                "Failed to get connection from pool",
            )
        })
    }

    /// Map a driver error without leaking server details
    pub fn to_store_error(error: &RedisError, operation: StoreOperation) -> StoreError {
        tracing::error!(operation = %operation, error = %error, "Redis command failed");
        StoreError::backend(BackendKind::Redis, operation, Self::sanitize_error(error))
    }

    /// Sanitize Redis errors for security
    pub fn sanitize_error(error: &RedisError) -> String {
        match error.kind() {
            RedisErrorKind::AuthenticationFailed => "Authentication failed".to_string(),
            RedisErrorKind::TypeError => "Data type error".to_string(),
            RedisErrorKind::ExecAbortError => "Transaction aborted".to_string(),
            RedisErrorKind::BusyLoadingError => "Redis is loading data".to_string(),
            RedisErrorKind::ReadOnly => "Redis is read-only".to_string(),
            _ if error.is_connection_refusal() || error.is_connection_dropped() => {
                "Connection error".to_string()
            }
            _ if error.is_timeout() => "Operation timeout".to_string(),
            _ => "Redis operation failed".to_string(),
        }
    }
}
