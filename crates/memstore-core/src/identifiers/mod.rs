//! Validated identifiers for the memory data model
//!
//! Every record is addressed by `(tenant, namespace, key)`. All three parts
//! share one rule set (non-empty, `[A-Za-z0-9_-]` only), enforced by the
//! `parse()` constructors below so that backends only ever see validated
//! values.
//!
//! # Examples
//!
//! ```rust
//! use memstore_core::identifiers::{Namespace, RecordKey};
//!
//! let ns = Namespace::parse("prefs").unwrap();
//! let key = RecordKey::parse("tone").unwrap();
//! assert_eq!(format!("{ns}/{key}"), "prefs/tone");
//!
//! assert!(Namespace::parse("").is_err());
//! assert!(RecordKey::parse("prefs/tone").is_err());
//! ```

mod validation;

pub use validation::{IdValidationError, IdValidator, IdentifierLabel};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Defines a validated string newtype bound to one [`IdentifierLabel`].
macro_rules! define_identifier {
    (
        $(#[$meta:meta])*
        $name:ident => $label:expr
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Parse and validate from a string
            pub fn parse(id: impl AsRef<str>) -> Result<Self, IdValidationError> {
                let id = id.as_ref();
                IdValidator::validate(id, $label)?;
                Ok(Self(id.to_string()))
            }

            /// Get the identifier as a string slice
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Create without validation (for testing only)
            #[doc(hidden)]
            pub fn new_unchecked(id: impl Into<String>) -> Self {
                Self(id.into())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = IdValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdValidationError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::parse(s)
            }
        }
    };
}

define_identifier!(
    /// A category grouping related memories (e.g. `preferences`)
    Namespace => IdentifierLabel::Namespace
);

define_identifier!(
    /// The identifier of a single memory within a namespace
    RecordKey => IdentifierLabel::Key
);

define_identifier!(
    /// The single configured scope under which all records are stored
    TenantId => IdentifierLabel::Tenant
);

/// Prefix used to enumerate records: the tenant, optionally narrowed to one namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPrefix {
    pub tenant: TenantId,
    pub namespace: Option<Namespace>,
}

impl SearchPrefix {
    /// All records of a tenant
    pub fn tenant(tenant: TenantId) -> Self {
        Self {
            tenant,
            namespace: None,
        }
    }

    /// Records of a tenant under one namespace
    pub fn namespace(tenant: TenantId, namespace: Namespace) -> Self {
        Self {
            tenant,
            namespace: Some(namespace),
        }
    }
}

/// The `(tenant, namespace)` pair a single record lives under
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordScope {
    pub tenant: TenantId,
    pub namespace: Namespace,
}

impl RecordScope {
    pub fn new(tenant: TenantId, namespace: Namespace) -> Self {
        Self { tenant, namespace }
    }
}
