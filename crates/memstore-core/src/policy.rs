//! Access policy for memory operations
//!
//! Static for the lifetime of the process. Two lists drive it:
//! - an allow-list of key names (empty means every key is allowed)
//! - a read-only set of fully-qualified `namespace/key` paths

use std::collections::BTreeSet;

/// Key allow-list and read-only markers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessPolicy {
    allowed_keys: BTreeSet<String>,
    read_only: BTreeSet<String>,
}

impl AccessPolicy {
    /// Policy that permits everything and protects nothing
    pub fn permissive() -> Self {
        Self::default()
    }

    /// Build from already split lists
    pub fn from_lists<A, R>(allowed_keys: A, read_only: R) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self {
            allowed_keys: allowed_keys.into_iter().map(Into::into).collect(),
            read_only: read_only.into_iter().map(Into::into).collect(),
        }
    }

    /// Build from comma-separated configuration strings
    ///
    /// ```rust
    /// use memstore_core::AccessPolicy;
    ///
    /// let policy = AccessPolicy::from_csv("tone, style,", "prefs/tone");
    /// assert!(policy.is_key_allowed("style"));
    /// assert!(!policy.is_key_allowed("other"));
    /// assert!(policy.is_read_only("prefs", "tone"));
    /// ```
    pub fn from_csv(allowed_keys: &str, read_only: &str) -> Self {
        Self::from_lists(split_list(allowed_keys), split_list(read_only))
    }

    /// Namespace-level gating. Always true; filtering happens per key.
    pub fn is_namespace_allowed(&self, _namespace: &str) -> bool {
        true
    }

    /// Exact, case-sensitive membership of `namespace/key` in the read-only set
    pub fn is_read_only(&self, namespace: &str, key: &str) -> bool {
        self.read_only.contains(&format!("{namespace}/{key}"))
    }

    /// True when the allow-list is empty or contains `key`
    pub fn is_key_allowed(&self, key: &str) -> bool {
        self.allowed_keys.is_empty() || self.allowed_keys.contains(key)
    }

    pub fn has_allow_list(&self) -> bool {
        !self.allowed_keys.is_empty()
    }

    pub fn allowed_keys(&self) -> impl Iterator<Item = &str> {
        self.allowed_keys.iter().map(String::as_str)
    }

    pub fn read_only_paths(&self) -> impl Iterator<Item = &str> {
        self.read_only.iter().map(String::as_str)
    }
}

/// Split a comma-separated list, trimming entries and dropping empty ones
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}
