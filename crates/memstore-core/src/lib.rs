//! # Memstore Core
//!
//! Data model, access policy and store orchestration for a namespaced
//! agent memory. Backends plug in through [`StoreConnector`]; the
//! [`MemoryStore`] composes identifier validation, the [`AccessPolicy`]
//! and one injected connector into the list/read/write/edit operations.

pub mod backend;
pub mod error;
pub mod file_config;
pub mod identifiers;
pub mod in_memory;
pub mod policy;
pub mod record;
pub mod store;

pub use backend::{SetupGuard, StoreConnector, StoreHandle, TtlConfig};
pub use error::{BackendKind, StoreError, StoreErrorKind, StoreOperation, StoreResult};
pub use file_config::{FileConfig, FileConfigCatalog, MemoryConfig};
pub use identifiers::{
    IdValidationError, IdValidator, IdentifierLabel, Namespace, RecordKey, RecordScope,
    SearchPrefix, TenantId,
};
pub use in_memory::InMemoryConnector;
pub use policy::AccessPolicy;
pub use record::{MemoryContent, MemoryEntry, MemoryRecord, NamespaceSummary, WriteOutcome};
pub use store::MemoryStore;
