//! Rollback matcher (spec.md §4.7): hash table keyed by
//! `(uba_block, slot, rci)` pairing a cancelling 5.4/5.5 record with the
//! record pair it cancels, for the case where the matching pair has
//! already left the tail chunk by the time the rollback arrives.

use std::collections::HashMap;

use crate::ids::RollbackKey;
use crate::txn::chunk::RecordPair;

#[derive(Default)]
pub struct RollbackMatcher {
    /// Rollback arrived first: key -> waiting to cancel the next
    /// matching pair.
    pending_rollbacks: HashMap<RollbackKey, ()>,
    /// Data arrived first (physical ordering isn't guaranteed in some
    /// recovery paths): key -> the pair awaiting a rollback.
    pending_pairs: HashMap<RollbackKey, RecordPair>,
}

impl RollbackMatcher {
    pub fn new() -> RollbackMatcher {
        RollbackMatcher::default()
    }

    /// A rollback record arrived with no match in the tail chunk. If a
    /// pair is already waiting under this key, it's cancelled
    /// immediately; otherwise the rollback itself is queued.
    pub fn queue_rollback(&mut self, key: RollbackKey) -> Option<RecordPair> {
        if let Some(pair) = self.pending_pairs.remove(&key) {
            return Some(pair);
        }
        self.pending_rollbacks.insert(key, ());
        None
    }

    /// A record pair left its chunk (e.g. evicted to make room) before
    /// any rollback claimed it. Returns `true` if a queued rollback
    /// immediately cancels it.
    pub fn offer_pair(&mut self, key: RollbackKey, pair: RecordPair) -> bool {
        if self.pending_rollbacks.remove(&key).is_some() {
            return true;
        }
        self.pending_pairs.insert(key, pair);
        false
    }

    /// Entries unclaimed at a transaction's commit are ignored (spec.md
    /// §4.7): call to drop stale state for keys that belonged to a
    /// transaction that just finished.
    pub fn forget(&mut self, keys: &[RollbackKey]) {
        for key in keys {
            self.pending_rollbacks.remove(key);
            self.pending_pairs.remove(key);
        }
    }

    pub fn len(&self) -> usize {
        self.pending_rollbacks.len() + self.pending_pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> RollbackKey {
        RollbackKey { uba_block: 1, slot: 2, rci: 3 }
    }

    #[test]
    fn rollback_then_pair_cancels_immediately() {
        let mut m = RollbackMatcher::new();
        assert!(m.queue_rollback(key()).is_none());
        let cancelled = m.offer_pair(key(), RecordPair { undo: None, redo: None });
        assert!(cancelled);
        assert!(m.is_empty());
    }

    #[test]
    fn pair_then_rollback_cancels_immediately() {
        let mut m = RollbackMatcher::new();
        m.offer_pair(key(), RecordPair { undo: None, redo: None });
        let cancelled = m.queue_rollback(key());
        assert!(cancelled.is_some());
        assert!(m.is_empty());
    }

    #[test]
    fn forget_drops_unclaimed_entries() {
        let mut m = RollbackMatcher::new();
        m.queue_rollback(key());
        m.forget(&[key()]);
        assert!(m.is_empty());
    }
}
