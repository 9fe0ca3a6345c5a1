//! Transaction buffer (spec.md §4.5): owns the chunk arena and the
//! per-XID `Transaction` table, with LIFO free-list chunk reuse.

use std::collections::HashMap;

use crate::error::{CResult, Error};
use crate::ids::{RollbackKey, Xid};
use crate::primitives::Scn;
use crate::txn::chunk::{Chunk, RecordPair};
use crate::txn::transaction::{Transaction, TransactionState};

pub struct TransactionBuffer {
    arena: Vec<Chunk>,
    free_list: Vec<usize>,
    cap_bytes: usize,
    used_bytes: usize,
    transactions: HashMap<Xid, Transaction>,
}

impl TransactionBuffer {
    pub fn new(cap_mb: usize) -> TransactionBuffer {
        TransactionBuffer {
            arena: Vec::new(),
            free_list: Vec::new(),
            cap_bytes: cap_mb * 1024 * 1024,
            used_bytes: 0,
            transactions: HashMap::new(),
        }
    }

    pub fn get(&self, xid: Xid) -> Option<&Transaction> {
        self.transactions.get(&xid)
    }

    pub fn get_mut(&mut self, xid: Xid) -> Option<&mut Transaction> {
        self.transactions.get_mut(&xid)
    }

    pub fn begin(&mut self, xid: Xid, first_sequence: u32, first_scn: Scn) -> &mut Transaction {
        self.transactions.entry(xid).or_insert_with(|| Transaction::new(xid, first_sequence, first_scn))
    }

    /// Appends one record pair to `xid`'s tail chunk, allocating a new
    /// chunk from the free list (or growing the arena) if it doesn't
    /// fit. Marks the transaction `Overflow` and returns
    /// `Error::TransactionTooLarge` once the arena cap is hit; the
    /// caller is expected to discard the pair and subsequent ones for
    /// this transaction from then on.
    pub fn append(&mut self, xid: Xid, first_sequence: u32, first_scn: Scn, pair: RecordPair) -> CResult<()> {
        if self.transactions.get(&xid).map(|t| t.state) == Some(TransactionState::Overflow) {
            return Err(Error::TransactionTooLarge(xid.to_string()));
        }
        self.begin(xid, first_sequence, first_scn);

        let tail_id = *self.transactions[&xid].chunk_ids.last().unwrap_or(&usize::MAX);
        let size = pair.approx_size();

        let pair = if tail_id != usize::MAX {
            match self.arena[tail_id].try_append(pair) {
                Ok(()) => {
                    self.txn_mut(xid).record_count += 1;
                    return Ok(());
                }
                Err(p) => p,
            }
        } else {
            pair
        };

        if self.used_bytes + size > self.cap_bytes {
            self.txn_mut(xid).state = TransactionState::Overflow;
            return Err(Error::TransactionTooLarge(xid.to_string()));
        }

        let chunk_id = self.alloc_chunk();
        self.arena[chunk_id].try_append(pair).map_err(|_| {
            Error::Internal("record pair larger than chunk capacity".to_string())
        })?;
        self.used_bytes += size;
        let txn = self.txn_mut(xid);
        txn.chunk_ids.push(chunk_id);
        txn.record_count += 1;
        Ok(())
    }

    fn txn_mut(&mut self, xid: Xid) -> &mut Transaction {
        self.transactions.get_mut(&xid).expect("transaction must exist")
    }

    fn alloc_chunk(&mut self) -> usize {
        if let Some(id) = self.free_list.pop() {
            self.arena[id].reset();
            id
        } else {
            let id = self.arena.len();
            self.arena.push(Chunk::new(id));
            id
        }
    }

    /// Partial rollback (5.4/5.5): try the tail chunk first; if not
    /// found there, the caller queues the rollback in the matcher.
    pub fn try_immediate_rollback(&mut self, xid: Xid, key: RollbackKey) -> Option<RecordPair> {
        let tail_id = *self.transactions.get(&xid)?.chunk_ids.last()?;
        let pair = self.arena[tail_id].pop_last_matching(key)?;
        self.used_bytes = self.used_bytes.saturating_sub(pair.approx_size());
        Some(pair)
    }

    /// Drains `xid`'s chunk list in insertion order and returns its
    /// chunks to the free list LIFO, per spec.md §4.5's cache-locality
    /// note. Called once by the assembler on commit or rollback.
    pub fn drain(&mut self, xid: Xid) -> Vec<RecordPair> {
        let Some(txn) = self.transactions.remove(&xid) else {
            return Vec::new();
        };
        let mut pairs = Vec::new();
        for &chunk_id in &txn.chunk_ids {
            self.used_bytes = self
                .used_bytes
                .saturating_sub(self.arena[chunk_id].pairs().iter().map(|p| p.approx_size()).sum());
            pairs.extend(self.arena[chunk_id].pairs().iter().cloned());
        }
        for &chunk_id in txn.chunk_ids.iter().rev() {
            self.free_list.push(chunk_id);
        }
        pairs
    }

    pub fn open_transaction_count(&self) -> usize {
        self.transactions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::txn::chunk::RecordPair;

    fn xid() -> Xid {
        Xid::new(1, 2, 3)
    }

    #[test]
    fn append_then_drain_preserves_order() {
        let mut buf = TransactionBuffer::new(1);
        for _ in 0..3 {
            buf.append(xid(), 1, Scn(0x10), RecordPair { undo: None, redo: None }).unwrap();
        }
        assert_eq!(buf.get(xid()).unwrap().record_count, 3);
        let drained = buf.drain(xid());
        assert_eq!(drained.len(), 3);
        assert!(buf.get(xid()).is_none());
    }

    #[test]
    fn chunk_returned_to_free_list_is_reused() {
        let mut buf = TransactionBuffer::new(1);
        buf.append(xid(), 1, Scn(0x10), RecordPair { undo: None, redo: None }).unwrap();
        buf.drain(xid());
        assert_eq!(buf.free_list.len(), 1);
        buf.append(Xid::new(9, 9, 9), 1, Scn(0x10), RecordPair { undo: None, redo: None }).unwrap();
        assert!(buf.free_list.is_empty());
        assert_eq!(buf.arena.len(), 1);
    }
}
