//! Redis backend
//!
//! Records are hashes under a configurable key prefix, with per-tenant
//! set indexes for enumeration. Writes go through one atomic pipeline
//! and take their timestamps from the server clock.

pub mod config;
#[cfg(feature = "redis")]
mod connector;
#[cfg(feature = "redis")]
mod layout;
#[cfg(feature = "redis")]
pub mod pool;

pub use config::RedisConfig;
#[cfg(feature = "redis")]
pub use connector::RedisConnector;
#[cfg(feature = "redis")]
pub use layout::{KeyLayout, LAYOUT_VERSION};
