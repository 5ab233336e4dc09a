//! MCP error types
//!
//! [`McpError`] covers failures of the server itself (transport, startup).
//! Store failures never become protocol errors: tools catch them and
//! report them inside the response body, tagged with an [`ErrorType`].

use memstore_core::{StoreError, StoreErrorKind};
use serde::Serialize;
use thiserror::Error;

/// MCP operation result type
pub type McpResult<T> = Result<T, McpError>;

/// Errors that can occur while running the MCP server
#[derive(Debug, Error)]
pub enum McpError {
    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Transport failed to initialize or dropped
    #[error("Transport error: {0}")]
    TransportError(String),

    /// Server error
    #[error("Server error: {0}")]
    ServerError(String),
}

impl McpError {
    /// Create an error from an rmcp error message
    pub fn from_rmcp_error(error: impl std::fmt::Display) -> Self {
        McpError::TransportError(error.to_string())
    }
}

/// Which tool is reporting, since the tag set differs between reads and writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    Ls,
    ReadFile,
    WriteFile,
    EditFile,
}

impl ToolKind {
    fn is_write(self) -> bool {
        matches!(self, ToolKind::WriteFile | ToolKind::EditFile)
    }
}

/// `type` tag of an error envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    NotFound,
    PermissionDenied,
    ValidationError,
    Error,
}

impl ErrorType {
    /// Classify a store error for the given tool.
    ///
    /// `ls` only ever reports `error`. Reads have no validation tag, so a
    /// malformed identifier is a plain `error` there.
    pub fn classify(error: &StoreError, tool: ToolKind) -> Self {
        if tool == ToolKind::Ls {
            return ErrorType::Error;
        }
        match error.kind() {
            StoreErrorKind::RecordNotFound => ErrorType::NotFound,
            StoreErrorKind::PermissionDenied
            | StoreErrorKind::NamespaceNotAllowed
            | StoreErrorKind::ReadOnlyViolation => ErrorType::PermissionDenied,
            StoreErrorKind::InvalidIdentifier if tool.is_write() => ErrorType::ValidationError,
            StoreErrorKind::InvalidIdentifier
            | StoreErrorKind::UnsupportedBackend
            | StoreErrorKind::Setup
            | StoreErrorKind::Backend => ErrorType::Error,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::NotFound => "not_found",
            ErrorType::PermissionDenied => "permission_denied",
            ErrorType::ValidationError => "validation_error",
            ErrorType::Error => "error",
        }
    }
}
