//! Flat key-value snapshot

use std::collections::BTreeMap;

use crate::model::ConfigurationSetting;

/// Value and content type of one loaded key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub value: Option<String>,
    pub content_type: Option<String>,
}

impl From<ConfigurationSetting> for SnapshotEntry {
    fn from(setting: ConfigurationSetting) -> Self {
        Self {
            value: setting.value,
            content_type: setting.content_type,
        }
    }
}

/// Settings loaded by [`load`](super::load), keyed by (trimmed) key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    entries: BTreeMap<String, SnapshotEntry>,
}

impl Snapshot {
    /// Creates an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a key.
    pub fn insert(&mut self, key: impl Into<String>, entry: SnapshotEntry) -> Option<SnapshotEntry> {
        self.entries.insert(key.into(), entry)
    }

    /// Adds a plain-text key.
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, SnapshotEntry {
            value: Some(value.into()),
            content_type: None,
        });
        self
    }

    /// Adds a key with an explicit content type.
    pub fn with_typed_value(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Self {
        self.insert(key, SnapshotEntry {
            value: Some(value.into()),
            content_type: Some(content_type.into()),
        });
        self
    }

    /// Returns the entry for a key.
    pub fn entry(&self, key: &str) -> Option<&SnapshotEntry> {
        self.entries.get(key)
    }

    /// Returns the value of a key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key)?.value.as_deref()
    }

    /// Iterates over keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Iterates over entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SnapshotEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, SnapshotEntry)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (String, SnapshotEntry)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
