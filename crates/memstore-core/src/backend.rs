//! Backend connector abstraction
//!
//! A [`StoreConnector`] owns the connection to one external store and runs
//! its one-time setup. Every logical operation asks it for a fresh
//! [`StoreHandle`] via [`StoreConnector::scoped_store`]; the handle owns a
//! pooled connection (or a collection handle) and gives it back when dropped,
//! whichever way the operation ends.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OnceCell;

use crate::error::{BackendKind, StoreResult};
use crate::identifiers::{RecordKey, RecordScope, SearchPrefix};
use crate::record::MemoryRecord;

/// Expiry applied to written records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlConfig {
    pub default_ttl: Duration,
}

impl TtlConfig {
    pub fn from_minutes(minutes: u64) -> Self {
        Self {
            default_ttl: Duration::from_secs(minutes.saturating_mul(60)),
        }
    }

    /// Whole seconds, never less than one
    pub fn as_secs(&self) -> u64 {
        self.default_ttl.as_secs().max(1)
    }
}

/// Connection owner for one backend.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    /// Which backend this connector talks to
    fn backend(&self) -> BackendKind;

    /// Run backend initialization at most once per process.
    ///
    /// Concurrent first callers wait on the same attempt. A failed attempt is
    /// not remembered, so the next call retries.
    async fn ensure_setup(&self) -> StoreResult<()>;

    /// Acquire a handle valid for one logical operation.
    ///
    /// Implementations call [`ensure_setup`](Self::ensure_setup) first.
    async fn scoped_store(&self, ttl: Option<TtlConfig>) -> StoreResult<Box<dyn StoreHandle>>;
}

/// Primitive operations over a live backend connection.
///
/// `put` overwrites unconditionally; uniqueness and existence checks belong
/// to the caller.
#[async_trait]
pub trait StoreHandle: Send {
    /// All live records under the prefix
    async fn search(&mut self, prefix: &SearchPrefix) -> StoreResult<Vec<MemoryRecord>>;

    /// One record, or `None` when absent or expired
    async fn get(&mut self, scope: &RecordScope, key: &RecordKey)
    -> StoreResult<Option<MemoryRecord>>;

    /// Upsert. `created_at` survives overwrites, `updated_at` comes from the backend clock.
    async fn put(&mut self, scope: &RecordScope, key: &RecordKey, content: &str)
    -> StoreResult<()>;
}

/// One-time initialization guard shared by all connectors
#[derive(Debug, Default)]
pub struct SetupGuard {
    cell: OnceCell<()>,
}

impl SetupGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `init` unless a previous run succeeded.
    pub async fn run<F, Fut>(&self, init: F) -> StoreResult<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = StoreResult<()>>,
    {
        self.cell.get_or_try_init(init).await.map(|_| ())
    }

    pub fn is_complete(&self) -> bool {
        self.cell.initialized()
    }
}
