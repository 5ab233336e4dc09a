//! MongoDB backend

pub mod config;
#[cfg(feature = "mongodb")]
mod connector;

pub use config::MongoConfig;
#[cfg(feature = "mongodb")]
pub use connector::MongoConnector;
