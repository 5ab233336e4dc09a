//! The four memory tools, independent of the MCP transport
//!
//! Every call returns a JSON envelope. Failures are reported in-band as
//! `{"error": ..., "type": ...}` (plus `"success": false` for writes) so an
//! agent can react to them instead of seeing a protocol fault.

use std::sync::Arc;

use memstore_core::{MemoryStore, StoreError};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{error, info, warn};

use crate::error::{ErrorType, ToolKind};

/// Hint appended when `edit_file` targets a record that does not exist
const EDIT_MISSING_HINT: &str = "Use write_file to create new memories.";

/// Tool implementations over a shared [`MemoryStore`]
#[derive(Clone)]
pub struct MemoryTools {
    store: Arc<MemoryStore>,
}

impl MemoryTools {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    /// List namespaces when `path` is empty or absent, else the memories in
    /// the namespace named by `path`.
    pub async fn ls(&self, path: Option<&str>) -> Value {
        match path.filter(|p| !p.is_empty()) {
            None => match self.store.list_namespaces().await {
                Ok(namespaces) => {
                    info!(count = namespaces.len(), "Listed namespaces");
                    json!({
                        "type": "namespaces",
                        "count": namespaces.len(),
                        "namespaces": namespaces,
                    })
                }
                Err(e) => failure(&e, ToolKind::Ls, None),
            },
            Some(namespace) => match self.store.list_memories(namespace).await {
                Ok(memories) => {
                    info!(namespace = %namespace, count = memories.len(), "Listed memories");
                    json!({
                        "type": "memories",
                        "namespace": namespace,
                        "count": memories.len(),
                        "memories": memories,
                    })
                }
                Err(e) => failure(&e, ToolKind::Ls, None),
            },
        }
    }

    pub async fn read_file(&self, namespace: &str, key: &str) -> Value {
        match self.store.get_memory(namespace, key).await {
            Ok(content) => {
                info!(namespace = %namespace, key = %key, "Read memory");
                to_value(&content)
            }
            Err(e) => failure(&e, ToolKind::ReadFile, None),
        }
    }

    /// Create or overwrite a memory
    pub async fn write_file(&self, namespace: &str, key: &str, content: &str) -> Value {
        match self.store.put_memory(namespace, key, content).await {
            Ok(outcome) => {
                info!(namespace = %namespace, key = %key, "Wrote memory");
                to_value(&outcome)
            }
            Err(e) => failure(&e, ToolKind::WriteFile, None),
        }
    }

    /// Replace the content of an existing memory; fails with `not_found` otherwise
    pub async fn edit_file(&self, namespace: &str, key: &str, content: &str) -> Value {
        match self.store.update_memory(namespace, key, content).await {
            Ok(outcome) => {
                info!(namespace = %namespace, key = %key, "Updated memory");
                to_value(&outcome)
            }
            Err(e) => failure(&e, ToolKind::EditFile, Some(EDIT_MISSING_HINT)),
        }
    }
}

fn to_value<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|e| {
        error!(error = %e, "Failed to serialize tool result");
        json!({ "error": e.to_string(), "type": ErrorType::Error.as_str() })
    })
}

/// Build the error envelope for `error` raised by `tool`.
///
/// `not_found_hint` is appended to the message of `not_found` errors.
fn failure(error: &StoreError, tool: ToolKind, not_found_hint: Option<&str>) -> Value {
    let error_type = ErrorType::classify(error, tool);
    let mut message = error.to_string();

    match error_type {
        ErrorType::NotFound => {
            if let Some(hint) = not_found_hint {
                message = format!("{}. {}", message, hint);
            }
            warn!(tool = ?tool, error = %error, "Memory not found");
        }
        ErrorType::PermissionDenied => warn!(tool = ?tool, error = %error, "Permission denied"),
        ErrorType::ValidationError => warn!(tool = ?tool, error = %error, "Invalid input"),
        ErrorType::Error => error!(tool = ?tool, error = %error, "Memory tool failed"),
    }

    match tool {
        ToolKind::WriteFile | ToolKind::EditFile => json!({
            "success": false,
            "error": message,
            "type": error_type,
        }),
        ToolKind::Ls | ToolKind::ReadFile => json!({
            "error": message,
            "type": error_type,
        }),
    }
}
