//! Replicated map.
//!
//! A key-granularity LWW map: each key holds one `Register` and merges
//! independently of every other key. Live iteration is in key order, so a
//! materialized sequence is identical on every converged replica regardless
//! of the order peers inserted in.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::crdt::{Crdt, Register};

/// How a merge or local write changed the live view of one key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    Inserted,
    Updated,
    Removed,
}

/// One changed key within a map event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyChange {
    pub key: String,
    pub kind: ChangeKind,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplicatedMap<T> {
    entries: BTreeMap<String, Register<T>>,
}

impl<T: Clone> ReplicatedMap<T> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.entries.get(key).and_then(|r| r.value())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Live entries in key order. Tombstones are skipped.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries
            .iter()
            .filter_map(|(k, r)| r.value().map(|v| (k.as_str(), v)))
    }

    pub fn live_keys(&self) -> impl Iterator<Item = &str> {
        self.iter().map(|(k, _)| k)
    }

    pub fn live_len(&self) -> usize {
        self.iter().count()
    }

    pub fn register(&self, key: &str) -> Option<&Register<T>> {
        self.entries.get(key)
    }

    /// Overwrite a key with a freshly stamped register.
    ///
    /// Local writes always carry a stamp newer than anything this replica
    /// has seen, so no join is needed; the caller guarantees the stamp comes
    /// from the document clock.
    pub(crate) fn write(&mut self, key: String, register: Register<T>) -> Option<KeyChange> {
        let was_live = self.contains(&key);
        let now_live = !register.is_tombstone();
        self.entries.insert(key.clone(), register);
        change_kind(was_live, now_live).map(|kind| KeyChange { key, kind })
    }

    /// LWW merge of one incoming register. Returns the live-view change, if
    /// any; a losing or redundant incoming write produces none.
    pub(crate) fn merge(&mut self, key: String, incoming: Register<T>) -> Option<KeyChange> {
        let was_live = self.contains(&key);
        let winner = match self.entries.get(&key) {
            Some(existing) => {
                if existing.stamp() >= incoming.stamp() {
                    return None;
                }
                existing.join(&incoming)
            }
            None => incoming,
        };
        let now_live = !winner.is_tombstone();
        self.entries.insert(key.clone(), winner);
        change_kind(was_live, now_live).map(|kind| KeyChange { key, kind })
    }
}

fn change_kind(was_live: bool, now_live: bool) -> Option<ChangeKind> {
    match (was_live, now_live) {
        (false, true) => Some(ChangeKind::Inserted),
        (true, true) => Some(ChangeKind::Updated),
        (true, false) => Some(ChangeKind::Removed),
        (false, false) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::PeerId;
    use crate::time::{Stamp, WriteStamp};

    fn stamp(wall_ms: u64, peer: &str) -> Stamp {
        Stamp::new(WriteStamp::new(wall_ms, 0), PeerId::new(peer).unwrap())
    }

    #[test]
    fn iteration_is_key_sorted_and_live_only() {
        let mut map = ReplicatedMap::new();
        map.write("b".into(), Register::live(2, stamp(1, "p")));
        map.write("a".into(), Register::live(1, stamp(2, "p")));
        map.write("c".into(), Register::live(3, stamp(3, "p")));
        map.write("b".into(), Register::tombstone(stamp(4, "p")));

        let keys: Vec<_> = map.live_keys().collect();
        assert_eq!(keys, vec!["a", "c"]);
        assert_eq!(map.live_len(), 2);
        assert!(!map.contains("b"));
    }

    #[test]
    fn write_classifies_changes() {
        let mut map = ReplicatedMap::new();
        let insert = map.write("k".into(), Register::live(1, stamp(1, "p")));
        assert_eq!(insert.unwrap().kind, ChangeKind::Inserted);

        let update = map.write("k".into(), Register::live(2, stamp(2, "p")));
        assert_eq!(update.unwrap().kind, ChangeKind::Updated);

        let remove = map.write("k".into(), Register::tombstone(stamp(3, "p")));
        assert_eq!(remove.unwrap().kind, ChangeKind::Removed);

        // Tombstone over tombstone is not observable.
        let redundant = map.write("k".into(), Register::tombstone(stamp(4, "p")));
        assert!(redundant.is_none());
    }

    #[test]
    fn merge_ignores_stale_incoming() {
        let mut map = ReplicatedMap::new();
        map.write("k".into(), Register::live(10, stamp(5, "p")));

        assert!(map.merge("k".into(), Register::live(9, stamp(4, "q"))).is_none());
        assert_eq!(map.get("k"), Some(&10));
    }

    #[test]
    fn merge_applies_newer_incoming() {
        let mut map = ReplicatedMap::new();
        map.write("k".into(), Register::live(10, stamp(5, "p")));

        let change = map.merge("k".into(), Register::live(11, stamp(6, "q")));
        assert_eq!(change.unwrap().kind, ChangeKind::Updated);
        assert_eq!(map.get("k"), Some(&11));
    }

    #[test]
    fn merge_tombstone_for_unknown_key_is_silent_but_sticky() {
        let mut map: ReplicatedMap<i32> = ReplicatedMap::new();
        assert!(map
            .merge("k".into(), Register::tombstone(stamp(9, "q")))
            .is_none());

        // An older concurrent write must still lose to the stored tombstone.
        assert!(map.merge("k".into(), Register::live(1, stamp(8, "p"))).is_none());
        assert!(!map.contains("k"));
    }
}
