//! Transaction heap (spec.md §4.6): a binary min-heap ordered by
//! `(first_sequence, first_scn)`, with O(log n) removal via a secondary
//! index of heap positions. The min's `first_scn` drives the checkpoint
//! watermark (invariant 3).

use std::collections::HashMap;

use crate::ids::Xid;
use crate::primitives::Scn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct HeapKey {
    first_sequence: u32,
    first_scn: Scn,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    key: HeapKey,
    xid: Xid,
}

pub struct TransactionHeap {
    entries: Vec<Entry>,
    positions: HashMap<Xid, usize>,
    capacity: usize,
}

impl TransactionHeap {
    pub fn new(capacity: usize) -> TransactionHeap {
        TransactionHeap { entries: Vec::new(), positions: HashMap::new(), capacity }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// `insert(xid)`: fails if the heap is at `max-concurrent-transactions`
    /// capacity -- the replay loop must pause reading until a commit frees
    /// a slot.
    pub fn insert(&mut self, xid: Xid, first_sequence: u32, first_scn: Scn) -> bool {
        if self.positions.contains_key(&xid) {
            return true;
        }
        if self.is_full() {
            return false;
        }
        let idx = self.entries.len();
        self.entries.push(Entry { key: HeapKey { first_sequence, first_scn }, xid });
        self.positions.insert(xid, idx);
        self.sift_up(idx);
        true
    }

    pub fn remove(&mut self, xid: Xid) {
        let Some(&idx) = self.positions.get(&xid) else { return };
        let last = self.entries.len() - 1;
        self.swap(idx, last);
        self.entries.pop();
        self.positions.remove(&xid);
        if idx < self.entries.len() {
            self.sift_down(idx);
            self.sift_up(idx);
        }
    }

    /// `peek_min() -> first_scn`: the replication checkpoint watermark.
    pub fn peek_min(&self) -> Option<Scn> {
        self.entries.first().map(|e| e.key.first_scn)
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.entries.swap(a, b);
        self.positions.insert(self.entries[a].xid, a);
        self.positions.insert(self.entries[b].xid, b);
    }

    fn sift_up(&mut self, mut idx: usize) {
        while idx > 0 {
            let parent = (idx - 1) / 2;
            if self.entries[idx].key < self.entries[parent].key {
                self.swap(idx, parent);
                idx = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut idx: usize) {
        let len = self.entries.len();
        loop {
            let left = idx * 2 + 1;
            let right = idx * 2 + 2;
            let mut smallest = idx;
            if left < len && self.entries[left].key < self.entries[smallest].key {
                smallest = left;
            }
            if right < len && self.entries[right].key < self.entries[smallest].key {
                smallest = right;
            }
            if smallest == idx {
                break;
            }
            self.swap(idx, smallest);
            idx = smallest;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peek_min_tracks_oldest_transaction() {
        let mut heap = TransactionHeap::new(10);
        heap.insert(Xid::new(1, 0, 1), 5, Scn(0x20));
        heap.insert(Xid::new(1, 0, 2), 3, Scn(0x10));
        heap.insert(Xid::new(1, 0, 3), 9, Scn(0x30));
        assert_eq!(heap.peek_min(), Some(Scn(0x10)));
    }

    #[test]
    fn remove_promotes_next_min() {
        let mut heap = TransactionHeap::new(10);
        heap.insert(Xid::new(1, 0, 1), 3, Scn(0x10));
        heap.insert(Xid::new(1, 0, 2), 5, Scn(0x20));
        heap.remove(Xid::new(1, 0, 1));
        assert_eq!(heap.peek_min(), Some(Scn(0x20)));
    }

    #[test]
    fn insert_fails_at_capacity() {
        let mut heap = TransactionHeap::new(1);
        assert!(heap.insert(Xid::new(1, 0, 1), 1, Scn(1)));
        assert!(!heap.insert(Xid::new(1, 0, 2), 1, Scn(2)));
    }
}
