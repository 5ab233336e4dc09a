//! Redis connection configuration

use memstore_core::{BackendKind, StoreError, StoreResult};
use serde::Serialize;

/// Redis connection parameters, read once at startup
#[derive(Debug, Clone, Serialize)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    /// Password for AUTH
    #[serde(skip_serializing)]
    pub password: Option<String>,
    /// Database number (0-15)
    pub database: u8,
    /// Prefix for every key written by the store
    pub key_prefix: String,
    /// Connection pool size
    pub pool_size: usize,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            password: None,
            database: 0,
            key_prefix: "memstore".to_string(),
            pool_size: 10,
        }
    }
}

impl RedisConfig {
    /// Set authentication password; empty means none
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        let password = password.into();
        self.password = (!password.is_empty()).then_some(password);
        self
    }

    /// Set key prefix for isolation between deployments
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Connection URL, `redis://[:password@]host:port/db`
    pub fn url(&self) -> String {
        match &self.password {
            Some(password) => format!(
                "redis://:{}@{}:{}/{}",
                password, self.host, self.port, self.database
            ),
            None => format!("redis://{}:{}/{}", self.host, self.port, self.database),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> StoreResult<()> {
        let invalid = |reason: &str| Err(StoreError::setup(BackendKind::Redis, reason));

        if self.host.is_empty() {
            return invalid("Redis host cannot be empty");
        }
        if self.database > 15 {
            return invalid("Redis database must be between 0 and 15");
        }
        if self.pool_size == 0 {
            return invalid("Pool size cannot be zero");
        }
        if self.pool_size > 100 {
            return invalid("Pool size too large (max 100)");
        }
        if self.key_prefix.is_empty() || self.key_prefix.contains(char::is_whitespace) {
            return invalid("Key prefix must be non-empty and contain no whitespace");
        }

        Ok(())
    }
}
