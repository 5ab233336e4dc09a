//! PostgreSQL backend
//!
//! One `memory_records` table keyed by `(user_id, namespace, key)`, created
//! by versioned migrations on first use. Timestamps come from `NOW()` on
//! the server; expiry is stored per row and filtered on read.

pub mod config;
#[cfg(feature = "postgres")]
mod connector;
#[cfg(feature = "postgres")]
pub mod migrations;
#[cfg(feature = "postgres")]
pub mod pool;

pub use config::PostgresConfig;
#[cfg(feature = "postgres")]
pub use connector::PostgresConnector;
#[cfg(feature = "postgres")]
pub use migrations::{PostgresMigration, PostgresMigrationEngine};
#[cfg(feature = "postgres")]
pub use pool::{PooledConnection, PostgresPool};
