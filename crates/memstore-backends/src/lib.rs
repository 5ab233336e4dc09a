//! # Memstore Backends
//!
//! Connectors for the external stores that persist memories. Each backend
//! sits behind a cargo feature (`redis`, `postgres`, `mongodb`, all on by
//! default); configuration types are always available so settings can be
//! parsed and reported regardless of which drivers are compiled in.
//!
//! ```rust,no_run
//! use memstore_backends::{BackendSettings, select};
//!
//! # async fn run() -> memstore_core::StoreResult<()> {
//! let connector = select("postgresql", &BackendSettings::default())?;
//! connector.ensure_setup().await?;
//! # Ok(())
//! # }
//! ```

pub mod mongodb;
pub mod postgres;
pub mod redis;
pub mod selector;

pub use self::mongodb::MongoConfig;
pub use self::postgres::PostgresConfig;
pub use self::redis::RedisConfig;
pub use selector::{BackendSettings, available_backends, connect, select};

#[cfg(feature = "mongodb")]
pub use self::mongodb::MongoConnector;
#[cfg(feature = "postgres")]
pub use self::postgres::PostgresConnector;
#[cfg(feature = "redis")]
pub use self::redis::RedisConnector;
