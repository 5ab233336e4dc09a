//! MongoDB connection configuration

use memstore_core::{BackendKind, StoreError, StoreResult};
use serde::Serialize;

/// MongoDB connection parameters
#[derive(Debug, Clone, Serialize)]
pub struct MongoConfig {
    /// Connection string; credentials are redacted when serialized
    #[serde(serialize_with = "serialize_redacted_uri")]
    pub uri: String,
    pub database: String,
    pub collection: String,
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            uri: "mongodb://localhost:27017".to_string(),
            database: "memstore".to_string(),
            collection: "memories".to_string(),
        }
    }
}

impl MongoConfig {
    /// The URI with any `user:password@` section masked
    pub fn redacted_uri(&self) -> String {
        let Some((scheme, rest)) = self.uri.split_once("://") else {
            return self.uri.clone();
        };
        match rest.split_once('@') {
            Some((_, host)) => format!("{scheme}://***@{host}"),
            None => self.uri.clone(),
        }
    }

    pub fn validate(&self) -> StoreResult<()> {
        let invalid = |reason: &str| Err(StoreError::setup(BackendKind::MongoDb, reason));

        if !(self.uri.starts_with("mongodb://") || self.uri.starts_with("mongodb+srv://")) {
            return invalid("URI must start with mongodb:// or mongodb+srv://");
        }
        if self.database.is_empty() || self.database.contains(['/', '\\', '.', ' ', '"', '$']) {
            return invalid("Database name is empty or contains invalid characters");
        }
        if self.collection.is_empty()
            || self.collection.starts_with("system.")
            || self.collection.contains('$')
        {
            return invalid("Collection name is empty or reserved");
        }

        Ok(())
    }
}

fn serialize_redacted_uri<S: serde::Serializer>(uri: &str, serializer: S) -> Result<S::Ok, S::Error> {
    let config = MongoConfig {
        uri: uri.to_string(),
        ..Default::default()
    };
    serializer.serialize_str(&config.redacted_uri())
}
