//! Store errors.
//!
//! Validation and policy failures are raised before any backend call.
//! Backend failures carry the backend and the primitive that failed.
//! [`StoreError::kind`] gives a fieldless tag so callers can branch
//! exhaustively without matching on messages.

use std::fmt;

use thiserror::Error;

use crate::identifiers::IdValidationError;

/// Strongly-typed storage backend identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Redis,
    Postgres,
    MongoDb,
    InMemory,
}

impl BackendKind {
    /// Backends selectable through configuration
    pub const SELECTABLE: [BackendKind; 3] =
        [BackendKind::Redis, BackendKind::Postgres, BackendKind::MongoDb];

    /// Configuration name of the backend
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Redis => "redis",
            BackendKind::Postgres => "postgresql",
            BackendKind::MongoDb => "mongodb",
            BackendKind::InMemory => "in-memory",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BackendKind {
    type Err = StoreError;

    /// Case-insensitive match on the three configurable backends.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        Self::SELECTABLE
            .into_iter()
            .find(|kind| kind.as_str() == name)
            .ok_or(StoreError::UnsupportedBackend { name })
    }
}

/// Backend primitive that was running when an I/O error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOperation {
    Connect,
    Search,
    Get,
    Put,
}

impl fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreOperation::Connect => write!(f, "connect"),
            StoreOperation::Search => write!(f, "search"),
            StoreOperation::Get => write!(f, "get"),
            StoreOperation::Put => write!(f, "put"),
        }
    }
}

/// Errors surfaced by the memory store and its backends.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Malformed namespace, key or tenant
    #[error(transparent)]
    InvalidIdentifier(#[from] IdValidationError),

    /// Namespace rejected by the access policy
    #[error("Namespace '{namespace}' is not in the allowed list")]
    NamespaceNotAllowed { namespace: String },

    /// Key outside the configured allow-list
    #[error("Memory '{key}' is not in the allowed files list")]
    PermissionDenied { key: String },

    /// Write attempted on a protected record
    #[error("Memory '{namespace}/{key}' is marked as read-only")]
    ReadOnlyViolation { namespace: String, key: String },

    /// Read or update target is absent
    #[error("Memory '{key}' not found in namespace '{namespace}'")]
    RecordNotFound { namespace: String, key: String },

    /// Unknown backend name in configuration
    #[error("Invalid BACKEND setting: '{name}'. Must be one of: redis, postgresql, mongodb")]
    UnsupportedBackend { name: String },

    /// One-time backend initialization failed
    #[error("{backend} store setup failed: {reason}")]
    Setup { backend: BackendKind, reason: String },

    /// Backend I/O failure
    #[error("{backend} {operation} failed: {reason}")]
    Backend {
        backend: BackendKind,
        operation: StoreOperation,
        reason: String,
    },
}

/// Fieldless classification of [`StoreError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreErrorKind {
    InvalidIdentifier,
    NamespaceNotAllowed,
    PermissionDenied,
    ReadOnlyViolation,
    RecordNotFound,
    UnsupportedBackend,
    Setup,
    Backend,
}

impl StoreError {
    /// Create a backend I/O error.
    pub fn backend(
        backend: BackendKind,
        operation: StoreOperation,
        reason: impl Into<String>,
    ) -> Self {
        StoreError::Backend {
            backend,
            operation,
            reason: reason.into(),
        }
    }

    /// Create a setup error.
    pub fn setup(backend: BackendKind, reason: impl Into<String>) -> Self {
        StoreError::Setup {
            backend,
            reason: reason.into(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> StoreErrorKind {
        match self {
            StoreError::InvalidIdentifier(_) => StoreErrorKind::InvalidIdentifier,
            StoreError::NamespaceNotAllowed { .. } => StoreErrorKind::NamespaceNotAllowed,
            StoreError::PermissionDenied { .. } => StoreErrorKind::PermissionDenied,
            StoreError::ReadOnlyViolation { .. } => StoreErrorKind::ReadOnlyViolation,
            StoreError::RecordNotFound { .. } => StoreErrorKind::RecordNotFound,
            StoreError::UnsupportedBackend { .. } => StoreErrorKind::UnsupportedBackend,
            StoreError::Setup { .. } => StoreErrorKind::Setup,
            StoreError::Backend { .. } => StoreErrorKind::Backend,
        }
    }

    /// Rejected by the access policy (namespace, allow-list or read-only set).
    pub fn is_policy_rejection(&self) -> bool {
        matches!(
            self.kind(),
            StoreErrorKind::NamespaceNotAllowed
                | StoreErrorKind::PermissionDenied
                | StoreErrorKind::ReadOnlyViolation
        )
    }

    /// Fatal at startup rather than per call.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind(),
            StoreErrorKind::UnsupportedBackend | StoreErrorKind::Setup
        )
    }
}

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifiers::{IdValidator, IdentifierLabel};

    #[test]
    fn test_backend_kind_parse_is_case_insensitive() {
        assert_eq!("redis".parse::<BackendKind>().unwrap(), BackendKind::Redis);
        assert_eq!("PostgreSQL".parse::<BackendKind>().unwrap(), BackendKind::Postgres);
        assert_eq!(" MongoDB ".parse::<BackendKind>().unwrap(), BackendKind::MongoDb);
    }

    #[test]
    fn test_backend_kind_rejects_unknown() {
        for name in ["sqlite", "postgres", "in-memory", ""] {
            let err = name.parse::<BackendKind>().unwrap_err();
            assert_eq!(err.kind(), StoreErrorKind::UnsupportedBackend);
            assert!(err.is_fatal());
        }
    }

    #[test]
    fn test_identifier_error_converts() {
        let err: StoreError = IdValidator::validate("", IdentifierLabel::Key)
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), StoreErrorKind::InvalidIdentifier);
        assert_eq!(err.to_string(), "key cannot be empty");
    }

    #[test]
    fn test_policy_classification() {
        let read_only = StoreError::ReadOnlyViolation {
            namespace: "prefs".into(),
            key: "tone".into(),
        };
        assert!(read_only.is_policy_rejection());
        assert_eq!(
            read_only.to_string(),
            "Memory 'prefs/tone' is marked as read-only"
        );

        let missing = StoreError::RecordNotFound {
            namespace: "prefs".into(),
            key: "tone".into(),
        };
        assert!(!missing.is_policy_rejection());
        assert!(!missing.is_fatal());
    }

    #[test]
    fn test_backend_error_display() {
        let err = StoreError::backend(BackendKind::Redis, StoreOperation::Get, "Connection error");
        assert_eq!(err.to_string(), "redis get failed: Connection error");
        assert_eq!(err.kind(), StoreErrorKind::Backend);
    }
}
