//! Records and the shaped results returned by [`MemoryStore`](crate::MemoryStore)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identifiers::{Namespace, RecordKey};

/// A stored memory as returned by a backend handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRecord {
    pub namespace: Namespace,
    pub key: RecordKey,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Aggregated view of one namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceSummary {
    pub name: String,
    pub file_count: usize,
}

/// Listing entry for a record, without its content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub key: String,
    pub namespace: String,
    pub is_read_only: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of reading one memory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryContent {
    pub namespace: String,
    pub key: String,
    pub content: String,
    pub is_read_only: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of a successful write or update.
///
/// Timestamps come from re-reading the record after the write, so they are
/// `None` only if the record vanished (or expired) in between.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOutcome {
    pub success: bool,
    pub message: String,
    pub namespace: String,
    pub key: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl MemoryRecord {
    pub(crate) fn into_entry(self, is_read_only: bool) -> MemoryEntry {
        MemoryEntry {
            key: self.key.into(),
            namespace: self.namespace.into(),
            is_read_only,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub(crate) fn into_content(self, is_read_only: bool) -> MemoryContent {
        MemoryContent {
            namespace: self.namespace.into(),
            key: self.key.into(),
            content: self.content,
            is_read_only,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_entry_serializes_rfc3339() {
        let ts = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let record = MemoryRecord {
            namespace: Namespace::new_unchecked("prefs"),
            key: RecordKey::new_unchecked("tone"),
            content: "concise".into(),
            created_at: ts,
            updated_at: ts,
        };

        let json = serde_json::to_value(record.into_entry(true)).unwrap();
        assert_eq!(json["key"], "tone");
        assert_eq!(json["namespace"], "prefs");
        assert_eq!(json["is_read_only"], true);
        assert_eq!(json["created_at"], "2025-01-02T03:04:05Z");
        assert!(json.get("content").is_none());
    }
}
