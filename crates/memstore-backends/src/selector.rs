//! Backend selection
//!
//! Resolves the configured backend name to a connector once at startup.
//! The returned connector is injected into the store; nothing here is global.

use std::sync::Arc;

use memstore_core::{BackendKind, StoreConnector, StoreError, StoreResult};
use serde::Serialize;
use tracing::info;

use crate::mongodb::MongoConfig;
use crate::postgres::PostgresConfig;
use crate::redis::RedisConfig;

/// Connection parameters for every backend; only the selected one is used
#[derive(Debug, Clone, Default, Serialize)]
pub struct BackendSettings {
    pub redis: RedisConfig,
    pub postgres: PostgresConfig,
    pub mongodb: MongoConfig,
}

/// Parse `name` and build the matching connector.
///
/// Fails with `UnsupportedBackend` for unknown names, or for a known
/// backend whose cargo feature is disabled.
pub fn select(name: &str, settings: &BackendSettings) -> StoreResult<Arc<dyn StoreConnector>> {
    let kind: BackendKind = name.parse()?;
    let connector = connect(kind, settings)?;
    info!(backend = %kind, "Selected storage backend");
    Ok(connector)
}

/// Build the connector for an already parsed backend kind
pub fn connect(kind: BackendKind, settings: &BackendSettings) -> StoreResult<Arc<dyn StoreConnector>> {
    match kind {
        #[cfg(feature = "redis")]
        BackendKind::Redis => Ok(Arc::new(crate::redis::RedisConnector::new(
            settings.redis.clone(),
        )?)),
        #[cfg(feature = "postgres")]
        BackendKind::Postgres => Ok(Arc::new(crate::postgres::PostgresConnector::new(
            settings.postgres.clone(),
        )?)),
        #[cfg(feature = "mongodb")]
        BackendKind::MongoDb => Ok(Arc::new(crate::mongodb::MongoConnector::new(
            settings.mongodb.clone(),
        )?)),
        other => Err(StoreError::UnsupportedBackend {
            name: other.to_string(),
        }),
    }
}

/// Backends compiled into this build
pub fn available_backends() -> Vec<BackendKind> {
    BackendKind::SELECTABLE
        .into_iter()
        .filter(|kind| match kind {
            BackendKind::Redis => cfg!(feature = "redis"),
            BackendKind::Postgres => cfg!(feature = "postgres"),
            BackendKind::MongoDb => cfg!(feature = "mongodb"),
            BackendKind::InMemory => false,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use memstore_core::StoreErrorKind;

    #[test]
    fn test_unknown_backend_is_rejected() {
        for name in ["sqlite", "", "redis-cluster", "in-memory"] {
            let err = select(name, &BackendSettings::default()).err().unwrap();
            assert_eq!(err.kind(), StoreErrorKind::UnsupportedBackend);
        }
    }

    #[test]
    fn test_in_memory_is_not_connectable_by_kind() {
        let err = connect(BackendKind::InMemory, &BackendSettings::default())
            .err()
            .unwrap();
        assert_eq!(err.kind(), StoreErrorKind::UnsupportedBackend);
    }

    #[cfg(feature = "postgres")]
    #[test]
    fn test_postgres_selection_is_lazy_and_case_insensitive() {
        // Building the connector must not touch the network
        let connector = select("PostgreSQL", &BackendSettings::default()).unwrap();
        assert_eq!(connector.backend(), BackendKind::Postgres);
    }

    #[cfg(feature = "mongodb")]
    #[test]
    fn test_mongodb_selection_is_lazy() {
        let connector = select("mongodb", &BackendSettings::default()).unwrap();
        assert_eq!(connector.backend(), BackendKind::MongoDb);
    }

    #[cfg(feature = "redis")]
    #[tokio::test]
    async fn test_redis_selection_is_lazy() {
        let connector = select("REDIS", &BackendSettings::default()).unwrap();
        assert_eq!(connector.backend(), BackendKind::Redis);
    }

    #[cfg(feature = "redis")]
    #[test]
    fn test_invalid_settings_fail_selection() {
        let settings = BackendSettings {
            redis: RedisConfig {
                pool_size: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        let err = select("redis", &settings).err().unwrap();
        assert_eq!(err.kind(), StoreErrorKind::Setup);
    }

    #[cfg(all(feature = "redis", feature = "postgres", feature = "mongodb"))]
    #[test]
    fn test_available_backends_default_features() {
        let available = available_backends();
        assert_eq!(available.len(), 3);
        assert!(!available.contains(&BackendKind::InMemory));
    }
}
