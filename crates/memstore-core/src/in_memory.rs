//! Process-local connector used by tests and embedding code.
//!
//! Not selectable through configuration; records live only as long as the
//! connector does.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::backend::{SetupGuard, StoreConnector, StoreHandle, TtlConfig};
use crate::error::{BackendKind, StoreError, StoreOperation, StoreResult};
use crate::identifiers::{Namespace, RecordKey, RecordScope, SearchPrefix, TenantId};
use crate::record::MemoryRecord;

type RecordId = (TenantId, Namespace, RecordKey);

#[derive(Debug, Clone)]
struct StoredRecord {
    content: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
}

impl StoredRecord {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }

    fn to_record(&self, namespace: &Namespace, key: &RecordKey) -> MemoryRecord {
        MemoryRecord {
            namespace: namespace.clone(),
            key: key.clone(),
            content: self.content.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// In-memory connector backed by a shared ordered map
#[derive(Debug, Clone)]
pub struct InMemoryConnector {
    data: Arc<RwLock<BTreeMap<RecordId, StoredRecord>>>,
    setup: Arc<SetupGuard>,
    setup_runs: Arc<AtomicUsize>,
    available: Arc<AtomicBool>,
}

impl Default for InMemoryConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryConnector {
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(BTreeMap::new())),
            setup: Arc::new(SetupGuard::new()),
            setup_runs: Arc::new(AtomicUsize::new(0)),
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    /// How many times setup actually ran
    pub fn setup_runs(&self) -> usize {
        self.setup_runs.load(Ordering::SeqCst)
    }

    /// Simulate an outage: while unavailable, every primitive fails with a backend error
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of stored records, expired ones included
    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }
}

#[async_trait]
impl StoreConnector for InMemoryConnector {
    fn backend(&self) -> BackendKind {
        BackendKind::InMemory
    }

    async fn ensure_setup(&self) -> StoreResult<()> {
        self.setup
            .run(|| async {
                if !self.available.load(Ordering::SeqCst) {
                    return Err(StoreError::setup(BackendKind::InMemory, "store unavailable"));
                }
                self.setup_runs.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
    }

    async fn scoped_store(&self, ttl: Option<TtlConfig>) -> StoreResult<Box<dyn StoreHandle>> {
        self.ensure_setup().await?;
        Ok(Box::new(InMemoryHandle {
            data: Arc::clone(&self.data),
            available: Arc::clone(&self.available),
            ttl,
        }))
    }
}

struct InMemoryHandle {
    data: Arc<RwLock<BTreeMap<RecordId, StoredRecord>>>,
    available: Arc<AtomicBool>,
    ttl: Option<TtlConfig>,
}

impl InMemoryHandle {
    fn check_available(&self, operation: StoreOperation) -> StoreResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::backend(
                BackendKind::InMemory,
                operation,
                "store unavailable",
            ))
        }
    }
}

#[async_trait]
impl StoreHandle for InMemoryHandle {
    async fn search(&mut self, prefix: &SearchPrefix) -> StoreResult<Vec<MemoryRecord>> {
        self.check_available(StoreOperation::Search)?;
        let now = Utc::now();
        let data = self.data.read().await;

        Ok(data
            .iter()
            .filter(|((tenant, namespace, _), _)| {
                *tenant == prefix.tenant
                    && prefix.namespace.as_ref().is_none_or(|ns| ns == namespace)
            })
            .filter(|(_, stored)| stored.is_live(now))
            .map(|((_, namespace, key), stored)| stored.to_record(namespace, key))
            .collect())
    }

    async fn get(
        &mut self,
        scope: &RecordScope,
        key: &RecordKey,
    ) -> StoreResult<Option<MemoryRecord>> {
        self.check_available(StoreOperation::Get)?;
        let id = (scope.tenant.clone(), scope.namespace.clone(), key.clone());
        let data = self.data.read().await;

        Ok(data
            .get(&id)
            .filter(|stored| stored.is_live(Utc::now()))
            .map(|stored| stored.to_record(&scope.namespace, key)))
    }

    async fn put(&mut self, scope: &RecordScope, key: &RecordKey, content: &str) -> StoreResult<()> {
        self.check_available(StoreOperation::Put)?;
        let now = Utc::now();
        let expires_at = self
            .ttl
            .and_then(|ttl| chrono::Duration::from_std(ttl.default_ttl).ok())
            .map(|ttl| now + ttl);

        let id = (scope.tenant.clone(), scope.namespace.clone(), key.clone());
        let mut data = self.data.write().await;
        let created_at = data
            .get(&id)
            .filter(|stored| stored.is_live(now))
            .map_or(now, |stored| stored.created_at);

        data.insert(
            id,
            StoredRecord {
                content: content.to_string(),
                created_at,
                updated_at: now,
                expires_at,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn scope(tenant: &str, namespace: &str) -> RecordScope {
        RecordScope::new(
            TenantId::parse(tenant).unwrap(),
            Namespace::parse(namespace).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_put_preserves_created_at() {
        let connector = InMemoryConnector::new();
        let scope = scope("alice", "prefs");
        let key = RecordKey::parse("tone").unwrap();

        let mut handle = connector.scoped_store(None).await.unwrap();
        handle.put(&scope, &key, "concise").await.unwrap();
        let first = handle.get(&scope, &key).await.unwrap().unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        handle.put(&scope, &key, "direct").await.unwrap();
        let second = handle.get(&scope, &key).await.unwrap().unwrap();

        assert_eq!(second.content, "direct");
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at > first.updated_at);
    }

    #[tokio::test]
    async fn test_search_is_scoped_by_tenant_and_namespace() {
        let connector = InMemoryConnector::new();
        let mut handle = connector.scoped_store(None).await.unwrap();
        let key = RecordKey::parse("k").unwrap();

        handle.put(&scope("alice", "a"), &key, "1").await.unwrap();
        handle.put(&scope("alice", "b"), &key, "2").await.unwrap();
        handle.put(&scope("bob", "a"), &key, "3").await.unwrap();

        let alice = TenantId::parse("alice").unwrap();
        let all = handle.search(&SearchPrefix::tenant(alice.clone())).await.unwrap();
        assert_eq!(all.len(), 2);

        let only_a = handle
            .search(&SearchPrefix::namespace(alice, Namespace::parse("a").unwrap()))
            .await
            .unwrap();
        assert_eq!(only_a.len(), 1);
        assert_eq!(only_a[0].content, "1");
    }

    #[tokio::test]
    async fn test_expired_records_are_hidden() {
        let connector = InMemoryConnector::new();
        let ttl = TtlConfig {
            default_ttl: Duration::from_millis(20),
        };
        let mut handle = connector.scoped_store(Some(ttl)).await.unwrap();
        let scope = scope("alice", "prefs");
        let key = RecordKey::parse("tone").unwrap();

        handle.put(&scope, &key, "short-lived").await.unwrap();
        assert!(handle.get(&scope, &key).await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(handle.get(&scope, &key).await.unwrap().is_none());
        assert!(
            handle
                .search(&SearchPrefix::tenant(scope.tenant.clone()))
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_setup_runs_once() {
        let connector = InMemoryConnector::new();
        for _ in 0..3 {
            let _handle = connector.scoped_store(None).await.unwrap();
        }
        assert_eq!(connector.setup_runs(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_primitives() {
        let connector = InMemoryConnector::new();
        let mut handle = connector.scoped_store(None).await.unwrap();
        connector.set_available(false);

        let err = handle
            .get(&scope("alice", "prefs"), &RecordKey::parse("tone").unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::StoreErrorKind::Backend);
    }
}
