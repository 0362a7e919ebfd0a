//! API name table
//!
//! Maps API display names ("Compute Engine API") to service ids
//! ("compute.googleapis.com"). A table is bundled into the binary; callers
//! may load their own from disk.

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::path::Path;

/// Bundled table (compiled into the binary)
const BUNDLED_API_NAMES: &str = include_str!("../resources/api_names.json");

/// Display name -> service id, iterated in display-name order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiNameTable {
    entries: BTreeMap<String, String>,
}

impl ApiNameTable {
    /// Parse the table bundled with the crate
    pub fn bundled() -> Result<Self> {
        Self::from_json(BUNDLED_API_NAMES)
    }

    /// Parse a JSON object of `{ "<display name>": "<service id>" }`
    pub fn from_json(content: &str) -> Result<Self> {
        let entries: BTreeMap<String, String> = serde_json::from_str(content)
            .map_err(|e| Error::DataUnavailable(format!("invalid API name table: {}", e)))?;
        Ok(Self { entries })
    }

    /// Load a table file; a missing or unreadable file is `DataUnavailable`
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::DataUnavailable(format!(
                "cannot read API name table {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&content)
    }

    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, display_name: &str) -> Option<&str> {
        self.entries.get(display_name).map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
