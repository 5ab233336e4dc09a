//! MongoDB connector
//!
//! One document per record:
//! `{user_id, namespace, key, content, created_at, updated_at, expires_at}`.
//! A unique compound index on `(user_id, namespace, key)` enforces one
//! document per record; a TTL index on `expires_at` lets the server reap
//! expired documents, and reads filter them out until it does.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use memstore_core::{
    BackendKind, MemoryRecord, Namespace, RecordKey, RecordScope, SearchPrefix, SetupGuard,
    StoreConnector, StoreError, StoreHandle, StoreOperation, StoreResult, TtlConfig,
};
use mongodb::bson::{self, Bson, Document, doc};
use mongodb::error::{Error as MongoError, ErrorKind};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, IndexModel};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::config::MongoConfig;

/// Connector for a MongoDB deployment
pub struct MongoConnector {
    config: MongoConfig,
    client: OnceCell<Client>,
    setup: SetupGuard,
}

impl MongoConnector {
    /// Validate configuration. The client is created on first use.
    pub fn new(config: MongoConfig) -> StoreResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            client: OnceCell::new(),
            setup: SetupGuard::new(),
        })
    }

    pub fn config(&self) -> &MongoConfig {
        &self.config
    }

    async fn client(&self) -> StoreResult<&Client> {
        self.client
            .get_or_try_init(|| async {
                Client::with_uri_str(&self.config.uri)
                    .await
                    .map_err(|e| to_store_error(&e, StoreOperation::Connect))
            })
            .await
    }

    async fn collection(&self) -> StoreResult<Collection<Document>> {
        Ok(self
            .client()
            .await?
            .database(&self.config.database)
            .collection(&self.config.collection))
    }

    async fn run_setup(&self) -> StoreResult<()> {
        let setup_error = |e: MongoError| StoreError::setup(BackendKind::MongoDb, sanitize_error(&e));

        let client = self
            .client()
            .await
            .map_err(|e| StoreError::setup(BackendKind::MongoDb, e.to_string()))?;
        client
            .database(&self.config.database)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(setup_error)?;

        let collection = self.collection().await?;
        collection
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "user_id": 1, "namespace": 1, "key": 1 })
                    .options(IndexOptions::builder().unique(true).build())
                    .build(),
            )
            .await
            .map_err(setup_error)?;
        collection
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "expires_at": 1 })
                    .options(IndexOptions::builder().expire_after(Duration::ZERO).build())
                    .build(),
            )
            .await
            .map_err(setup_error)?;

        info!(
            uri = %self.config.redacted_uri(),
            database = %self.config.database,
            collection = %self.config.collection,
            "MongoDB store ready"
        );
        Ok(())
    }
}

#[async_trait]
impl StoreConnector for MongoConnector {
    fn backend(&self) -> BackendKind {
        BackendKind::MongoDb
    }

    async fn ensure_setup(&self) -> StoreResult<()> {
        self.setup.run(|| self.run_setup()).await
    }

    async fn scoped_store(&self, ttl: Option<TtlConfig>) -> StoreResult<Box<dyn StoreHandle>> {
        self.ensure_setup().await?;
        let collection = self.collection().await?;
        debug!(ttl = ?ttl, "Acquired MongoDB store handle");
        Ok(Box::new(MongoHandle { collection, ttl }))
    }
}

struct MongoHandle {
    collection: Collection<Document>,
    ttl: Option<TtlConfig>,
}

/// Documents whose expiry has not passed
fn live_filter(mut filter: Document) -> Document {
    filter.insert(
        "$or",
        vec![
            doc! { "expires_at": Bson::Null },
            doc! { "expires_at": { "$gt": bson::DateTime::now() } },
        ],
    );
    filter
}

#[async_trait]
impl StoreHandle for MongoHandle {
    async fn search(&mut self, prefix: &SearchPrefix) -> StoreResult<Vec<MemoryRecord>> {
        let mut filter = doc! { "user_id": prefix.tenant.as_str() };
        if let Some(namespace) = &prefix.namespace {
            filter.insert("namespace", namespace.as_str());
        }

        let documents: Vec<Document> = self
            .collection
            .find(live_filter(filter))
            .await
            .map_err(|e| to_store_error(&e, StoreOperation::Search))?
            .try_collect()
            .await
            .map_err(|e| to_store_error(&e, StoreOperation::Search))?;

        documents
            .iter()
            .map(|document| document_to_record(document, StoreOperation::Search))
            .collect()
    }

    async fn get(
        &mut self,
        scope: &RecordScope,
        key: &RecordKey,
    ) -> StoreResult<Option<MemoryRecord>> {
        let filter = doc! {
            "user_id": scope.tenant.as_str(),
            "namespace": scope.namespace.as_str(),
            "key": key.as_str(),
        };

        let document = self
            .collection
            .find_one(live_filter(filter))
            .await
            .map_err(|e| to_store_error(&e, StoreOperation::Get))?;

        document
            .map(|document| document_to_record(&document, StoreOperation::Get))
            .transpose()
    }

    async fn put(&mut self, scope: &RecordScope, key: &RecordKey, content: &str) -> StoreResult<()> {
        let filter = doc! {
            "user_id": scope.tenant.as_str(),
            "namespace": scope.namespace.as_str(),
            "key": key.as_str(),
        };
        let expires_at = match self.ttl {
            Some(ttl) => {
                let ttl_ms = i64::try_from(ttl.default_ttl.as_millis()).unwrap_or(i64::MAX);
                Bson::Document(doc! { "$add": ["$$NOW", ttl_ms] })
            }
            None => Bson::Null,
        };
        // Pipeline form so timestamps come from the server clock. Content is
        // wrapped in $literal since pipeline strings starting with `$` are paths.
        // An expired document that is overwritten starts a new lifetime.
        let update = vec![doc! {
            "$set": {
                "content": { "$literal": content },
                "updated_at": "$$NOW",
                "created_at": {
                    "$cond": [
                        { "$eq": [{ "$type": "$expires_at" }, "date"] },
                        {
                            "$cond": [
                                { "$lte": ["$expires_at", "$$NOW"] },
                                "$$NOW",
                                { "$ifNull": ["$created_at", "$$NOW"] }
                            ]
                        },
                        { "$ifNull": ["$created_at", "$$NOW"] }
                    ]
                },
                "expires_at": expires_at,
            }
        }];

        self.collection
            .update_one(filter, update)
            .upsert(true)
            .await
            .map_err(|e| to_store_error(&e, StoreOperation::Put))?;
        Ok(())
    }
}

fn document_to_record(document: &Document, operation: StoreOperation) -> StoreResult<MemoryRecord> {
    let corrupt = |reason: String| StoreError::backend(BackendKind::MongoDb, operation, reason);
    let timestamp = |field: &str| -> StoreResult<DateTime<Utc>> {
        let millis = document
            .get_datetime(field)
            .map_err(|e| corrupt(e.to_string()))?
            .timestamp_millis();
        DateTime::<Utc>::from_timestamp_millis(millis)
            .ok_or_else(|| corrupt(format!("'{}' out of range", field)))
    };

    let namespace = document.get_str("namespace").map_err(|e| corrupt(e.to_string()))?;
    let key = document.get_str("key").map_err(|e| corrupt(e.to_string()))?;

    Ok(MemoryRecord {
        namespace: Namespace::parse(namespace).map_err(|e| corrupt(e.to_string()))?,
        key: RecordKey::parse(key).map_err(|e| corrupt(e.to_string()))?,
        content: document
            .get_str("content")
            .map_err(|e| corrupt(e.to_string()))?
            .to_string(),
        created_at: timestamp("created_at")?,
        updated_at: timestamp("updated_at")?,
    })
}

/// Sanitize MongoDB errors for security
fn sanitize_error(error: &MongoError) -> String {
    match error.kind.as_ref() {
        ErrorKind::Authentication { .. } => "Authentication failed".to_string(),
        ErrorKind::ServerSelection { .. } | ErrorKind::Io(_) => "Connection error".to_string(),
        ErrorKind::Command(_) | ErrorKind::Write(_) => "Database operation failed".to_string(),
        ErrorKind::InvalidArgument { .. } => "Invalid connection settings".to_string(),
        _ => "MongoDB operation failed".to_string(),
    }
}

fn to_store_error(error: &MongoError, operation: StoreOperation) -> StoreError {
    tracing::error!(operation = %operation, error = %error, "MongoDB operation failed");
    StoreError::backend(BackendKind::MongoDb, operation, sanitize_error(error))
}
