//! Key layout
//!
//! ```text
//! {prefix}:layout_version            string, stamped at setup
//! {prefix}:ns:{tenant}               set of namespaces
//! {prefix}:idx:{tenant}:{namespace}  set of keys
//! {prefix}:rec:{tenant}:{namespace}:{key}
//!                                    hash: content, created_at, updated_at
//! ```
//!
//! Identifiers cannot contain `:`, so the joins are unambiguous.

use memstore_core::{Namespace, RecordKey, RecordScope, TenantId};

/// Layout version written by this crate
pub const LAYOUT_VERSION: &str = "1";

pub const FIELD_CONTENT: &str = "content";
pub const FIELD_CREATED_AT: &str = "created_at";
pub const FIELD_UPDATED_AT: &str = "updated_at";

#[derive(Debug, Clone)]
pub struct KeyLayout {
    prefix: String,
}

impl KeyLayout {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn version_key(&self) -> String {
        format!("{}:layout_version", self.prefix)
    }

    pub fn namespaces_key(&self, tenant: &TenantId) -> String {
        format!("{}:ns:{}", self.prefix, tenant)
    }

    pub fn index_key(&self, tenant: &TenantId, namespace: &Namespace) -> String {
        format!("{}:idx:{}:{}", self.prefix, tenant, namespace)
    }

    pub fn record_key(&self, scope: &RecordScope, key: &RecordKey) -> String {
        format!(
            "{}:rec:{}:{}:{}",
            self.prefix, scope.tenant, scope.namespace, key
        )
    }
}
