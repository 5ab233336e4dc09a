//! Identifier validation rules and utilities

use std::fmt;

/// Which identifier is being validated, used in error messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentifierLabel {
    Namespace,
    Key,
    Tenant,
}

impl fmt::Display for IdentifierLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Namespace => write!(f, "namespace"),
            Self::Key => write!(f, "key"),
            Self::Tenant => write!(f, "user_id"),
        }
    }
}

/// Error type for identifier validation failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdValidationError {
    /// The identifier string is empty
    Empty { label: IdentifierLabel },
    /// The identifier contains characters outside `[A-Za-z0-9_-]`
    InvalidCharacters {
        label: IdentifierLabel,
        value: String,
    },
}

impl IdValidationError {
    /// Label of the identifier that failed validation
    pub fn label(&self) -> IdentifierLabel {
        match self {
            Self::Empty { label } | Self::InvalidCharacters { label, .. } => *label,
        }
    }
}

impl fmt::Display for IdValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty { label } => write!(f, "{} cannot be empty", label),
            Self::InvalidCharacters { label, value } => write!(
                f,
                "{} must contain only alphanumeric characters, hyphens, and underscores. Got: {}",
                label, value
            ),
        }
    }
}

impl std::error::Error for IdValidationError {}

/// Validator for namespace, key and tenant strings
pub struct IdValidator;

impl IdValidator {
    /// Validate an identifier string
    ///
    /// # Validation Rules
    ///
    /// - Non-empty
    /// - Only ASCII letters, digits, hyphens (`-`) and underscores (`_`)
    ///
    /// Separators such as `/`, `:` and `.` are rejected, so a validated
    /// identifier can be joined into storage keys without escaping.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use memstore_core::identifiers::{IdValidator, IdentifierLabel};
    ///
    /// assert!(IdValidator::validate("python-prefs", IdentifierLabel::Key).is_ok());
    /// assert!(IdValidator::validate("", IdentifierLabel::Key).is_err());
    /// assert!(IdValidator::validate("a/b", IdentifierLabel::Namespace).is_err());
    /// ```
    pub fn validate(id: &str, label: IdentifierLabel) -> Result<(), IdValidationError> {
        if id.is_empty() {
            return Err(IdValidationError::Empty { label });
        }

        if !id.chars().all(Self::is_valid_char) {
            return Err(IdValidationError::InvalidCharacters {
                label,
                value: id.to_string(),
            });
        }

        Ok(())
    }

    /// Check if a character is valid in an identifier
    pub fn is_valid_char(c: char) -> bool {
        c.is_ascii_alphanumeric() || c == '-' || c == '_'
    }
}
