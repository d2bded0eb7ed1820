//! Seen-message cache for gossip duplicate suppression.
//!
//! Maps a message digest to the heights the message referred to. Growth
//! is bounded by consensus progress rather than by capacity: every commit
//! must call [`DedupCache::prune_below`], which drops entries for heights
//! the node has moved past.

use std::collections::HashMap;
use std::sync::Mutex;

use quorum_types::MessageDigest;

use quorum_utils::lock;
use crate::progress::Heights;

/// Digest → provenance map behind a single lock.
#[derive(Default)]
pub struct DedupCache {
    entries: Mutex<HashMap<MessageDigest, Heights>>,
}

impl DedupCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provenance of a previously recorded digest.
    pub fn lookup(&self, digest: &MessageDigest) -> Option<Heights> {
        lock(&self.entries).get(digest).copied()
    }

    pub fn contains(&self, digest: &MessageDigest) -> bool {
        lock(&self.entries).contains_key(digest)
    }

    /// Record a digest. Returns `true` if it was new; an existing entry
    /// keeps its original provenance.
    pub fn record(&self, digest: MessageDigest, provenance: Heights) -> bool {
        let mut entries = lock(&self.entries);
        if entries.contains_key(&digest) {
            return false;
        }
        entries.insert(digest, provenance);
        true
    }

    /// Drop every entry whose non-zero block height is below `current.block`
    /// or whose non-zero key block height is below `current.key_block`.
    /// Returns the number of entries removed.
    pub fn prune_below(&self, current: Heights) -> usize {
        let mut entries = lock(&self.entries);
        let before = entries.len();
        entries.retain(|_, h| {
            let old_block = h.block > 0 && h.block < current.block;
            let old_key = h.key_block > 0 && h.key_block < current.key_block;
            !(old_block || old_key)
        });
        before - entries.len()
    }

    /// Number of cached digests.
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest(n: u8) -> MessageDigest {
        let mut bytes = [n; 32];
        bytes[0] = 0xd1;
        MessageDigest::new(bytes)
    }

    #[test]
    fn new_cache_is_empty() {
        let cache = DedupCache::new();
        assert!(cache.is_empty());
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.lookup(&digest(1)), None);
    }

    #[test]
    fn first_record_wins() {
        let cache = DedupCache::new();
        assert!(cache.record(digest(1), Heights::new(0, 5)));
        assert!(!cache.record(digest(1), Heights::new(9, 9)));
        assert_eq!(cache.lookup(&digest(1)), Some(Heights::new(0, 5)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn prune_removes_entries_behind_either_height() {
        let cache = DedupCache::new();
        cache.record(digest(1), Heights::new(9, 0));
        cache.record(digest(2), Heights::new(10, 0));
        cache.record(digest(3), Heights::new(0, 2));
        cache.record(digest(4), Heights::new(0, 3));

        let removed = cache.prune_below(Heights::new(10, 3));
        assert_eq!(removed, 2);
        assert!(!cache.contains(&digest(1)));
        assert!(cache.contains(&digest(2)));
        assert!(!cache.contains(&digest(3)));
        assert!(cache.contains(&digest(4)));
    }

    #[test]
    fn unset_heights_are_never_pruned() {
        let cache = DedupCache::new();
        cache.record(digest(1), Heights::default());
        assert_eq!(cache.prune_below(Heights::new(u64::MAX, u64::MAX)), 0);
        assert!(cache.contains(&digest(1)));
    }

    #[test]
    fn pruned_digest_can_be_recorded_again() {
        let cache = DedupCache::new();
        cache.record(digest(1), Heights::new(1, 0));
        cache.prune_below(Heights::new(2, 0));
        assert!(cache.record(digest(1), Heights::new(3, 0)));
    }

    #[test]
    fn concurrent_records_admit_exactly_one() {
        let cache = std::sync::Arc::new(DedupCache::new());
        let winners: usize = (0..8)
            .map(|_| {
                let cache = std::sync::Arc::clone(&cache);
                std::thread::spawn(move || cache.record(digest(7), Heights::new(1, 1)))
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|h| h.join().unwrap() as usize)
            .sum();
        assert_eq!(winners, 1);
    }
}
