//! Declarative memory descriptors
//!
//! A descriptor directory holds one JSON document per namespace. The file
//! stem names the namespace and the document lists the keys expected in it:
//!
//! ```json
//! {
//!   "files": [
//!     {
//!       "file_name": "tone",
//!       "file_description": "Preferred writing tone",
//!       "read_trigger": "Before drafting text",
//!       "write_trigger": "When the user states a tone preference",
//!       "update_trigger": "When the preference changes"
//!     }
//!   ]
//! }
//! ```
//!
//! Descriptors are loaded once at startup and enrich the server
//! instructions. Listing a key in a descriptor does not make it writable
//! and omitting it does not hide it: access is decided by the
//! [`AccessPolicy`] alone, whose key allow-list also filters which
//! descriptors are loaded. Unreadable or malformed documents are logged and
//! skipped.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::identifiers::{Namespace, RecordKey};
use crate::policy::AccessPolicy;

/// One expected key inside a namespace document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileConfig {
    pub file_name: RecordKey,
    pub file_description: String,
    pub read_trigger: String,
    pub write_trigger: String,
    pub update_trigger: String,
}

#[derive(Debug, Default, Deserialize)]
struct FileConfigDocument {
    #[serde(default)]
    files: Vec<FileConfig>,
}

/// A descriptor bound to its namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryConfig {
    pub namespace: Namespace,
    pub key: RecordKey,
    pub description: String,
    pub read_trigger: String,
    pub write_trigger: String,
    pub update_trigger: String,
}

impl MemoryConfig {
    fn new(namespace: Namespace, file: FileConfig) -> Self {
        Self {
            namespace,
            key: file.file_name,
            description: file.file_description,
            read_trigger: file.read_trigger,
            write_trigger: file.write_trigger,
            update_trigger: file.update_trigger,
        }
    }

    /// `namespace/key`
    pub fn full_path(&self) -> String {
        format!("{}/{}", self.namespace, self.key)
    }
}

/// All descriptors loaded from a directory
#[derive(Debug, Clone, Default)]
pub struct FileConfigCatalog {
    by_namespace: BTreeMap<Namespace, Vec<MemoryConfig>>,
}

impl FileConfigCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load every `*.json` in `dir`, keeping only keys the policy allows.
    pub fn load_dir(dir: impl AsRef<Path>, policy: &AccessPolicy) -> Self {
        let dir = dir.as_ref();

        if !dir.exists() {
            warn!(path = %dir.display(), "Config directory not found, running without file configurations");
            return Self::empty();
        }
        if !dir.is_dir() {
            error!(path = %dir.display(), "Config path is not a directory, running without file configurations");
            return Self::empty();
        }

        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                error!(path = %dir.display(), error = %e, "Failed to read config directory");
                return Self::empty();
            }
        };

        let mut paths: Vec<_> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        let mut configs = Vec::new();
        for path in paths {
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if stem.ends_with(".example") {
                continue;
            }
            let namespace = match Namespace::parse(stem) {
                Ok(namespace) => namespace,
                Err(e) => {
                    error!(file = %path.display(), error = %e, "Skipping config with invalid namespace name");
                    continue;
                }
            };

            match load_document(&path) {
                Ok(document) => {
                    debug!(file = %path.display(), count = document.files.len(), "Loaded file configs");
                    configs.extend(
                        document
                            .files
                            .into_iter()
                            .map(|file| MemoryConfig::new(namespace.clone(), file)),
                    );
                }
                Err(e) => {
                    error!(file = %path.display(), error = %e, "Error loading file config");
                }
            }
        }

        let total = configs.len();
        configs.retain(|config| policy.is_key_allowed(config.key.as_str()));
        if configs.len() < total {
            info!(filtered = total - configs.len(), "Filtered out files not in allowed files");
        }

        let catalog = Self::from_configs(configs);
        info!(count = catalog.len(), path = %dir.display(), "Loaded file configurations");
        catalog
    }

    pub fn from_configs(configs: impl IntoIterator<Item = MemoryConfig>) -> Self {
        let mut by_namespace: BTreeMap<Namespace, Vec<MemoryConfig>> = BTreeMap::new();
        for config in configs {
            by_namespace
                .entry(config.namespace.clone())
                .or_default()
                .push(config);
        }
        Self { by_namespace }
    }

    pub fn get(&self, namespace: &str, key: &str) -> Option<&MemoryConfig> {
        self.by_namespace
            .iter()
            .find(|(ns, _)| ns.as_str() == namespace)
            .and_then(|(_, configs)| configs.iter().find(|c| c.key.as_str() == key))
    }

    pub fn files_in(&self, namespace: &str) -> &[MemoryConfig] {
        self.by_namespace
            .iter()
            .find(|(ns, _)| ns.as_str() == namespace)
            .map(|(_, configs)| configs.as_slice())
            .unwrap_or_default()
    }

    /// Configured namespaces, sorted
    pub fn namespaces(&self) -> impl Iterator<Item = &Namespace> {
        self.by_namespace.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MemoryConfig> {
        self.by_namespace.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.by_namespace.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_namespace.is_empty()
    }

    /// "Configured Files" section, grouped by namespace
    pub fn format_files(&self) -> String {
        if self.is_empty() {
            return String::new();
        }
        let mut out = String::from("\n\nConfigured Files:");
        for (namespace, configs) in &self.by_namespace {
            let _ = write!(out, "\n\n{namespace}:");
            for config in configs {
                let _ = write!(out, "\n  - {}: {}", config.key, config.description);
            }
        }
        out
    }

    pub fn format_read_triggers(&self) -> String {
        self.format_triggers("When to read:", |c| c.read_trigger.as_str())
    }

    pub fn format_write_triggers(&self) -> String {
        self.format_triggers("When to create:", |c| c.write_trigger.as_str())
    }

    pub fn format_update_triggers(&self) -> String {
        self.format_triggers("When to update:", |c| c.update_trigger.as_str())
    }

    fn format_triggers(&self, heading: &str, trigger: impl Fn(&MemoryConfig) -> &str) -> String {
        if self.is_empty() {
            return String::new();
        }
        let mut out = format!("\n\n{heading}");
        for config in self.iter() {
            let _ = write!(out, "\n  - {}: {}", config.full_path(), trigger(config));
        }
        out
    }
}

fn load_document(path: &Path) -> Result<FileConfigDocument, String> {
    let raw = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    serde_json::from_str(&raw).map_err(|e| format!("Invalid JSON: {e}"))
}
