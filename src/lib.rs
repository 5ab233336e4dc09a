//! # Memstore
//!
//! Namespaced agent memory served over the Model Context Protocol.
//!
//! - [`memstore_core`]: identifiers, access policy, records and [`MemoryStore`]
//! - [`memstore_backends`]: Redis, PostgreSQL and MongoDB connectors
//! - [`memstore_mcp`]: the `ls` / `read_file` / `write_file` / `edit_file` tools

pub use memstore_backends;
pub use memstore_core;
pub use memstore_mcp;

pub use memstore_backends::{BackendSettings, select};
pub use memstore_core::{
    AccessPolicy, FileConfigCatalog, InMemoryConnector, MemoryStore, StoreConnector, StoreError,
    StoreErrorKind, TenantId,
};
pub use memstore_mcp::{MemoryMcpServer, MemoryTools};
