//! Ordered storages.
//!
//! A storage is a named ordered map from key bytes to versioned values.
//! Committed entries carry the commit version that produced them; deletes
//! leave a tombstone so that later committers can detect the conflict.

use bytes::Bytes;
use jogasaki_common::{Key, StorageId};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::options::ScanRange;

/// A committed entry.
#[derive(Debug, Clone)]
pub(crate) struct VersionedEntry {
    /// `None` for a tombstone.
    pub(crate) value: Option<Bytes>,
    pub(crate) version: u64,
}

/// A named ordered storage.
#[derive(Debug)]
pub struct Storage {
    id: StorageId,
    name: String,
    entries: RwLock<BTreeMap<Key, VersionedEntry>>,
}

/// Shared handle to a storage.
pub type StorageHandle = Arc<Storage>;

impl Storage {
    pub(crate) fn new(id: StorageId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Returns the storage id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> StorageId {
        self.id
    }

    /// Returns the storage name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of live committed entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .values()
            .filter(|e| e.value.is_some())
            .count()
    }

    /// Returns true if there is no live committed entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn get_committed(&self, key: &[u8]) -> Option<Bytes> {
        self.entries
            .read()
            .get(key)
            .and_then(|entry| entry.value.clone())
    }

    pub(crate) fn committed_version(&self, key: &[u8]) -> Option<u64> {
        self.entries.read().get(key).map(|entry| entry.version)
    }

    pub(crate) fn scan_committed(&self, range: &ScanRange) -> Vec<(Key, Bytes)> {
        if range.is_empty() {
            return Vec::new();
        }
        let entries = self.entries.read();
        entries
            .range((range.begin.clone(), range.end.clone()))
            .filter_map(|(k, e)| e.value.clone().map(|v| (k.clone(), v)))
            .collect()
    }

    pub(crate) fn apply(&self, key: Key, value: Option<Bytes>, version: u64) {
        self.entries
            .write()
            .insert(key, VersionedEntry { value, version });
    }
}
