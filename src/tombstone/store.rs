//! Concurrent tombstone map.
//!
//! Every mutation is a single `DashMap` operation on one key, which is the
//! only serialization the local delete path, remote command handlers and
//! the cleanup round need between them.

use super::IracTombstoneInfo;
use bytes::Bytes;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct TombstoneStore {
    tombstones: DashMap<Bytes, IracTombstoneInfo>,
}

impl TombstoneStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace. Returns the previous tombstone for the key.
    pub fn insert(&self, tombstone: IracTombstoneInfo) -> Option<IracTombstoneInfo> {
        self.tombstones.insert(tombstone.key.clone(), tombstone)
    }

    /// Insert only when the key has no tombstone. Returns whether it was stored.
    pub fn insert_if_absent(&self, tombstone: IracTombstoneInfo) -> bool {
        match self.tombstones.entry(tombstone.key.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(tombstone);
                true
            }
        }
    }

    pub fn get(&self, key: &[u8]) -> Option<IracTombstoneInfo> {
        self.tombstones.get(key).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.tombstones.contains_key(key)
    }

    /// Remove whatever tombstone the key has.
    pub fn remove(&self, key: &[u8]) -> Option<IracTombstoneInfo> {
        self.tombstones.remove(key).map(|(_, tombstone)| tombstone)
    }

    /// Remove the key's tombstone only if it equals `tombstone`.
    pub fn remove_if_matches(&self, tombstone: &IracTombstoneInfo) -> bool {
        self.tombstones
            .remove_if(&tombstone.key, |_, stored| stored == tombstone)
            .is_some()
    }

    /// Point-in-time copy of every tombstone.
    pub fn snapshot(&self) -> Vec<IracTombstoneInfo> {
        self.tombstones
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Tombstones belonging to any of `segments`.
    pub fn in_segments(&self, segments: &HashSet<u32>) -> Vec<IracTombstoneInfo> {
        self.tombstones
            .iter()
            .filter(|entry| segments.contains(&entry.value().segment))
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tombstones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tombstones.is_empty()
    }

    pub fn clear(&self) {
        self.tombstones.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use irac_clock::{IracMetadata, SiteName, SiteVersion, VersionVector};

    fn tombstone(key: &'static str, segment: u32, counter: u64) -> IracTombstoneInfo {
        let site = SiteName::new("A");
        let version = VersionVector::single(site.clone(), SiteVersion::new(1, counter));
        IracTombstoneInfo::new(
            Bytes::from_static(key.as_bytes()),
            segment,
            IracMetadata::new(site, version),
        )
    }

    #[test]
    fn test_insert_always_overwrites() {
        let store = TombstoneStore::new();
        assert!(store.insert(tombstone("k1", 2, 1)).is_none());

        let previous = store.insert(tombstone("k1", 2, 2));
        assert_eq!(previous, Some(tombstone("k1", 2, 1)));
        assert_eq!(store.get(b"k1"), Some(tombstone("k1", 2, 2)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_insert_if_absent_never_overwrites() {
        let store = TombstoneStore::new();
        assert!(store.insert_if_absent(tombstone("k1", 2, 1)));
        assert!(!store.insert_if_absent(tombstone("k1", 2, 5)));
        assert_eq!(store.get(b"k1"), Some(tombstone("k1", 2, 1)));
    }

    #[test]
    fn test_remove_if_matches_checks_metadata() {
        let store = TombstoneStore::new();
        store.insert(tombstone("k1", 2, 3));

        assert!(!store.remove_if_matches(&tombstone("k1", 2, 2)));
        assert!(store.contains(b"k1"));

        assert!(store.remove_if_matches(&tombstone("k1", 2, 3)));
        assert!(!store.contains(b"k1"));
        assert!(!store.remove_if_matches(&tombstone("k1", 2, 3)));
    }

    #[test]
    fn test_remove_if_matches_checks_segment() {
        let store = TombstoneStore::new();
        store.insert(tombstone("k1", 2, 3));
        assert!(!store.remove_if_matches(&tombstone("k1", 7, 3)));
        assert!(store.contains(b"k1"));
    }

    #[test]
    fn test_unconditional_remove() {
        let store = TombstoneStore::new();
        store.insert(tombstone("k1", 2, 3));
        assert_eq!(store.remove(b"k1"), Some(tombstone("k1", 2, 3)));
        assert!(store.remove(b"k1").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_filters_by_segment() {
        let store = TombstoneStore::new();
        store.insert(tombstone("k1", 1, 1));
        store.insert(tombstone("k2", 2, 1));
        store.insert(tombstone("k3", 3, 1));

        let segments: HashSet<u32> = [1, 3].into_iter().collect();
        let mut keys: Vec<Bytes> = store
            .in_segments(&segments)
            .into_iter()
            .map(|t| t.key)
            .collect();
        keys.sort();
        assert_eq!(
            keys,
            vec![Bytes::from_static(b"k1"), Bytes::from_static(b"k3")]
        );
        assert_eq!(store.snapshot().len(), 3);

        store.clear();
        assert!(store.is_empty());
    }
}
