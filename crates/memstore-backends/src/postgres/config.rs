//! PostgreSQL connection configuration
//!
//! This module provides configuration structures and validation for PostgreSQL connections.

use memstore_core::{BackendKind, StoreError, StoreResult};
use serde::Serialize;

/// PostgreSQL connection configuration
#[derive(Debug, Clone, Serialize)]
pub struct PostgresConfig {
    /// Database host
    pub host: String,
    /// Database port
    pub port: u16,
    /// Database name
    pub database: String,
    /// Username for authentication
    pub user: String,
    /// Password for authentication
    #[serde(skip_serializing)]
    pub password: Option<String>,
    /// Connection timeout in seconds
    pub connect_timeout: u64,
    /// Maximum simultaneous connections (1-100)
    pub pool_size: usize,
    /// Application name for connection identification
    pub application_name: String,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "memstore".to_string(),
            user: "postgres".to_string(),
            password: None,
            connect_timeout: 30,
            pool_size: 10,
            application_name: "memstore".to_string(),
        }
    }
}

impl PostgresConfig {
    /// Set password; empty means none
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        let password = password.into();
        self.password = (!password.is_empty()).then_some(password);
        self
    }

    /// Validate configuration for security
    pub fn validate(&self) -> StoreResult<()> {
        let invalid = |reason: &str| Err(StoreError::setup(BackendKind::Postgres, reason));

        if self.host.is_empty() {
            return invalid("Host cannot be empty");
        }
        if self.database.is_empty() {
            return invalid("Database name cannot be empty");
        }
        if self.user.is_empty() {
            return invalid("Username cannot be empty");
        }
        if self.pool_size == 0 || self.pool_size > 100 {
            return invalid("Pool size must be between 1 and 100");
        }
        if self.host.contains("..") || self.host.contains("//") {
            return invalid("Invalid host: potential path traversal detected");
        }
        if !self
            .database
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return invalid("Database name contains invalid characters");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(PostgresConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_values() {
        let bad = [
            PostgresConfig { host: String::new(), ..Default::default() },
            PostgresConfig { host: "../etc".into(), ..Default::default() },
            PostgresConfig { database: "mem store".into(), ..Default::default() },
            PostgresConfig { pool_size: 0, ..Default::default() },
            PostgresConfig { pool_size: 101, ..Default::default() },
            PostgresConfig { user: String::new(), ..Default::default() },
        ];
        for config in bad {
            let err = config.validate().unwrap_err();
            assert_eq!(err.kind(), memstore_core::StoreErrorKind::Setup);
        }
    }

    #[test]
    fn test_empty_password_is_none() {
        assert_eq!(PostgresConfig::default().with_password("").password, None);
        assert_eq!(
            PostgresConfig::default().with_password("pw").password.as_deref(),
            Some("pw")
        );
    }
}
