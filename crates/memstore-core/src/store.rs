//! Memory store orchestration
//!
//! Every operation follows the same path: validate identifiers, consult the
//! [`AccessPolicy`], acquire a scoped backend handle, run one or two
//! primitives, then shape the result. Validation and policy failures are
//! returned before the backend is touched.
//!
//! `update_memory` checks existence and then writes through two separate
//! primitives. A concurrent writer can land between them; backends expose
//! no conditional write to close that gap.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::backend::{StoreConnector, StoreHandle, TtlConfig};
use crate::error::{StoreError, StoreResult};
use crate::identifiers::{Namespace, RecordKey, RecordScope, SearchPrefix, TenantId};
use crate::policy::AccessPolicy;
use crate::record::{MemoryContent, MemoryEntry, NamespaceSummary, WriteOutcome};

const CREATED_MESSAGE: &str = "Memory created/updated successfully";
const UPDATED_MESSAGE: &str = "Memory updated successfully";

/// Namespaced memory operations over one injected connector.
#[derive(Clone)]
pub struct MemoryStore {
    connector: Arc<dyn StoreConnector>,
    policy: AccessPolicy,
    tenant: TenantId,
    ttl: Option<TtlConfig>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("backend", &self.connector.backend())
            .field("tenant", &self.tenant)
            .field("policy", &self.policy)
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl MemoryStore {
    pub fn new(connector: Arc<dyn StoreConnector>, policy: AccessPolicy, tenant: TenantId) -> Self {
        Self {
            connector,
            policy,
            tenant,
            ttl: None,
        }
    }

    /// Apply an expiry to every record written through this store
    pub fn with_ttl(mut self, ttl: Option<TtlConfig>) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    pub fn connector(&self) -> &Arc<dyn StoreConnector> {
        &self.connector
    }

    /// All namespaces holding at least one record, with per-namespace counts
    pub async fn list_namespaces(&self) -> StoreResult<Vec<NamespaceSummary>> {
        debug!(tenant = %self.tenant, "Listing all namespaces");

        let mut handle = self.handle().await?;
        let records = handle
            .search(&SearchPrefix::tenant(self.tenant.clone()))
            .await?;

        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for record in records {
            if !self.policy.is_namespace_allowed(record.namespace.as_str())
                || !self.policy.is_key_allowed(record.key.as_str())
            {
                continue;
            }
            *counts.entry(record.namespace.into()).or_default() += 1;
        }

        let namespaces: Vec<_> = counts
            .into_iter()
            .map(|(name, file_count)| NamespaceSummary { name, file_count })
            .collect();

        info!(count = namespaces.len(), "Found namespaces");
        Ok(namespaces)
    }

    /// Records in one namespace, sorted by key
    pub async fn list_memories(&self, namespace: &str) -> StoreResult<Vec<MemoryEntry>> {
        let namespace = self.checked_namespace(namespace)?;
        debug!(namespace = %namespace, "Listing memories");

        let mut handle = self.handle().await?;
        let mut records = handle
            .search(&SearchPrefix::namespace(self.tenant.clone(), namespace.clone()))
            .await?;
        records.sort_by(|a, b| a.key.cmp(&b.key));

        let memories: Vec<_> = records
            .into_iter()
            .filter(|record| self.policy.is_key_allowed(record.key.as_str()))
            .map(|record| {
                let read_only = self.policy.is_read_only(namespace.as_str(), record.key.as_str());
                record.into_entry(read_only)
            })
            .collect();

        info!(namespace = %namespace, count = memories.len(), "Found memories");
        Ok(memories)
    }

    /// Read one record
    pub async fn get_memory(&self, namespace: &str, key: &str) -> StoreResult<MemoryContent> {
        let (scope, key) = self.checked_target(namespace, key)?;
        debug!(namespace = %scope.namespace, key = %key, "Reading memory");

        let mut handle = self.handle().await?;
        let record = handle
            .get(&scope, &key)
            .await?
            .ok_or_else(|| not_found(&scope, &key))?;

        let read_only = self.policy.is_read_only(scope.namespace.as_str(), key.as_str());
        info!(namespace = %scope.namespace, key = %key, "Read memory");
        Ok(record.into_content(read_only))
    }

    /// Create or overwrite a record
    pub async fn put_memory(
        &self,
        namespace: &str,
        key: &str,
        content: &str,
    ) -> StoreResult<WriteOutcome> {
        let (scope, key) = self.checked_writable(namespace, key)?;
        debug!(namespace = %scope.namespace, key = %key, "Writing memory");

        let mut handle = self.handle().await?;
        let outcome = write_and_reread(handle.as_mut(), &scope, &key, content, CREATED_MESSAGE).await?;

        info!(namespace = %scope.namespace, key = %key, "Wrote memory");
        Ok(outcome)
    }

    /// Overwrite a record that must already exist
    pub async fn update_memory(
        &self,
        namespace: &str,
        key: &str,
        content: &str,
    ) -> StoreResult<WriteOutcome> {
        let (scope, key) = self.checked_writable(namespace, key)?;
        debug!(namespace = %scope.namespace, key = %key, "Updating memory");

        let mut handle = self.handle().await?;
        if handle.get(&scope, &key).await?.is_none() {
            return Err(not_found(&scope, &key));
        }
        let outcome = write_and_reread(handle.as_mut(), &scope, &key, content, UPDATED_MESSAGE).await?;

        info!(namespace = %scope.namespace, key = %key, "Updated memory");
        Ok(outcome)
    }

    /// Case-insensitive substring match on keys; an empty pattern matches everything
    pub async fn search_memories(
        &self,
        namespace: &str,
        pattern: &str,
    ) -> StoreResult<Vec<MemoryEntry>> {
        self.checked_namespace(namespace)?;
        debug!(namespace, pattern, "Searching memories");

        let needle = pattern.to_lowercase();
        let matching: Vec<_> = self
            .list_memories(namespace)
            .await?
            .into_iter()
            .filter(|memory| memory.key.to_lowercase().contains(&needle))
            .collect();

        info!(count = matching.len(), "Found matching memories");
        Ok(matching)
    }

    async fn handle(&self) -> StoreResult<Box<dyn StoreHandle>> {
        self.connector.scoped_store(self.ttl).await
    }

    fn checked_namespace(&self, namespace: &str) -> StoreResult<Namespace> {
        let namespace = Namespace::parse(namespace)?;
        if !self.policy.is_namespace_allowed(namespace.as_str()) {
            return Err(StoreError::NamespaceNotAllowed {
                namespace: namespace.into(),
            });
        }
        Ok(namespace)
    }

    fn checked_target(&self, namespace: &str, key: &str) -> StoreResult<(RecordScope, RecordKey)> {
        let namespace = Namespace::parse(namespace)?;
        let key = RecordKey::parse(key)?;
        if !self.policy.is_namespace_allowed(namespace.as_str()) {
            return Err(StoreError::NamespaceNotAllowed {
                namespace: namespace.into(),
            });
        }
        if !self.policy.is_key_allowed(key.as_str()) {
            return Err(StoreError::PermissionDenied { key: key.into() });
        }
        Ok((RecordScope::new(self.tenant.clone(), namespace), key))
    }

    fn checked_writable(&self, namespace: &str, key: &str) -> StoreResult<(RecordScope, RecordKey)> {
        let (scope, key) = self.checked_target(namespace, key)?;
        if self.policy.is_read_only(scope.namespace.as_str(), key.as_str()) {
            return Err(StoreError::ReadOnlyViolation {
                namespace: scope.namespace.into(),
                key: key.into(),
            });
        }
        Ok((scope, key))
    }
}

async fn write_and_reread(
    handle: &mut dyn StoreHandle,
    scope: &RecordScope,
    key: &RecordKey,
    content: &str,
    message: &str,
) -> StoreResult<WriteOutcome> {
    handle.put(scope, key, content).await?;
    let stored = handle.get(scope, key).await?;

    Ok(WriteOutcome {
        success: true,
        message: message.to_string(),
        namespace: scope.namespace.to_string(),
        key: key.to_string(),
        created_at: stored.as_ref().map(|record| record.created_at),
        updated_at: stored.as_ref().map(|record| record.updated_at),
    })
}

fn not_found(scope: &RecordScope, key: &RecordKey) -> StoreError {
    StoreError::RecordNotFound {
        namespace: scope.namespace.to_string(),
        key: key.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreErrorKind;
    use crate::in_memory::InMemoryConnector;

    fn store_with(policy: AccessPolicy) -> (MemoryStore, InMemoryConnector) {
        let connector = InMemoryConnector::new();
        let store = MemoryStore::new(
            Arc::new(connector.clone()),
            policy,
            TenantId::parse("default").unwrap(),
        );
        (store, connector)
    }

    fn store() -> MemoryStore {
        store_with(AccessPolicy::permissive()).0
    }

    #[tokio::test]
    async fn test_put_then_get_round_trip() {
        let store = store();
        let outcome = store.put_memory("prefs", "tone", "concise").await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.message, "Memory created/updated successfully");
        assert!(outcome.created_at.is_some());
        assert_eq!(outcome.created_at, outcome.updated_at);

        let memory = store.get_memory("prefs", "tone").await.unwrap();
        assert_eq!(memory.content, "concise");
        assert!(!memory.is_read_only);
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let err = store().get_memory("prefs", "tone").await.unwrap_err();
        assert_eq!(err.kind(), StoreErrorKind::RecordNotFound);
        assert_eq!(err.to_string(), "Memory 'tone' not found in namespace 'prefs'");
    }

    #[tokio::test]
    async fn test_update_missing_writes_nothing() {
        let (store, connector) = store_with(AccessPolicy::permissive());
        let err = store.update_memory("prefs", "tone", "direct").await.unwrap_err();
        assert_eq!(err.kind(), StoreErrorKind::RecordNotFound);

        let err = store.get_memory("prefs", "tone").await.unwrap_err();
        assert_eq!(err.kind(), StoreErrorKind::RecordNotFound);
        assert!(connector.is_empty().await);
    }

    #[tokio::test]
    async fn test_update_existing_keeps_created_at() {
        let store = store();
        let created = store.put_memory("prefs", "tone", "concise").await.unwrap();
        let updated = store.update_memory("prefs", "tone", "direct").await.unwrap();

        assert_eq!(updated.message, "Memory updated successfully");
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(store.get_memory("prefs", "tone").await.unwrap().content, "direct");
    }

    #[tokio::test]
    async fn test_read_only_rejects_writes_and_keeps_content() {
        let connector = InMemoryConnector::new();
        let tenant = TenantId::parse("default").unwrap();

        let open = MemoryStore::new(
            Arc::new(connector.clone()),
            AccessPolicy::permissive(),
            tenant.clone(),
        );
        open.put_memory("prefs", "tone", "concise").await.unwrap();

        let locked = MemoryStore::new(
            Arc::new(connector),
            AccessPolicy::from_csv("", "prefs/tone"),
            tenant,
        );
        let err = locked.put_memory("prefs", "tone", "loud").await.unwrap_err();
        assert_eq!(err.kind(), StoreErrorKind::ReadOnlyViolation);
        let err = locked.update_memory("prefs", "tone", "loud").await.unwrap_err();
        assert_eq!(err.kind(), StoreErrorKind::ReadOnlyViolation);

        let memory = locked.get_memory("prefs", "tone").await.unwrap();
        assert_eq!(memory.content, "concise");
        assert!(memory.is_read_only);
    }

    #[tokio::test]
    async fn test_invalid_identifiers_fail_before_backend() {
        let (store, connector) = store_with(AccessPolicy::permissive());
        connector.set_available(false);

        for (ns, key) in [("", "tone"), ("prefs", ""), ("pre/fs", "tone"), ("prefs", "to ne")] {
            let err = store.put_memory(ns, key, "x").await.unwrap_err();
            assert_eq!(err.kind(), StoreErrorKind::InvalidIdentifier);
        }
        let err = store.list_memories("a b").await.unwrap_err();
        assert_eq!(err.kind(), StoreErrorKind::InvalidIdentifier);
    }

    #[tokio::test]
    async fn test_allow_list_denies_and_filters() {
        let connector = InMemoryConnector::new();
        let tenant = TenantId::parse("default").unwrap();
        let open = MemoryStore::new(
            Arc::new(connector.clone()),
            AccessPolicy::permissive(),
            tenant.clone(),
        );
        open.put_memory("prefs", "tone", "concise").await.unwrap();
        open.put_memory("prefs", "secret", "hidden").await.unwrap();

        let restricted =
            MemoryStore::new(Arc::new(connector), AccessPolicy::from_csv("tone", ""), tenant);
        let err = restricted.get_memory("prefs", "secret").await.unwrap_err();
        assert_eq!(err.kind(), StoreErrorKind::PermissionDenied);
        let err = restricted.put_memory("prefs", "other", "x").await.unwrap_err();
        assert_eq!(err.kind(), StoreErrorKind::PermissionDenied);

        let memories = restricted.list_memories("prefs").await.unwrap();
        assert_eq!(memories.len(), 1);
        assert_eq!(memories[0].key, "tone");

        let namespaces = restricted.list_namespaces().await.unwrap();
        assert_eq!(namespaces[0].file_count, 1);
    }

    #[tokio::test]
    async fn test_listings_are_sorted() {
        let store = store();
        for (ns, key) in [("zeta", "b"), ("alpha", "z"), ("alpha", "a"), ("zeta", "a")] {
            store.put_memory(ns, key, "x").await.unwrap();
        }

        let names: Vec<_> = store
            .list_namespaces()
            .await
            .unwrap()
            .into_iter()
            .map(|ns| ns.name)
            .collect();
        assert_eq!(names, vec!["alpha", "zeta"]);

        let keys: Vec<_> = store
            .list_memories("alpha")
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.key)
            .collect();
        assert_eq!(keys, vec!["a", "z"]);
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive() {
        let store = store();
        for key in ["Python-Hints", "rust-style", "python_env"] {
            store.put_memory("code", key, "x").await.unwrap();
        }

        let hits = store.search_memories("code", "PYTHON").await.unwrap();
        let keys: Vec<_> = hits.into_iter().map(|m| m.key).collect();
        assert_eq!(keys, vec!["Python-Hints", "python_env"]);

        assert_eq!(store.search_memories("code", "").await.unwrap().len(), 3);
        assert!(store.search_memories("code", "go").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tenants_are_isolated() {
        let connector = InMemoryConnector::new();
        let alice = MemoryStore::new(
            Arc::new(connector.clone()),
            AccessPolicy::permissive(),
            TenantId::parse("alice").unwrap(),
        );
        let bob = MemoryStore::new(
            Arc::new(connector),
            AccessPolicy::permissive(),
            TenantId::parse("bob").unwrap(),
        );

        alice.put_memory("prefs", "tone", "concise").await.unwrap();
        assert!(bob.list_namespaces().await.unwrap().is_empty());
        assert_eq!(
            bob.get_memory("prefs", "tone").await.unwrap_err().kind(),
            StoreErrorKind::RecordNotFound
        );
    }

    #[tokio::test]
    async fn test_backend_failure_propagates() {
        let (store, connector) = store_with(AccessPolicy::permissive());
        store.put_memory("prefs", "tone", "concise").await.unwrap();
        connector.set_available(false);

        let err = store.list_namespaces().await.unwrap_err();
        assert_eq!(err.kind(), StoreErrorKind::Backend);
    }
}
