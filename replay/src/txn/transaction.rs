//! Transaction: mutable aggregate keyed by XID (spec.md §3).

use crate::ids::Xid;
use crate::primitives::Scn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Open,
    Committing,
    Committed,
    RolledBack,
    Overflow,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionFlags {
    pub is_dictionary_change: bool,
    pub has_rollback: bool,
    pub is_system: bool,
}

#[derive(Debug, Clone)]
pub struct Transaction {
    pub xid: Xid,
    pub first_sequence: u32,
    pub first_scn: Scn,
    pub commit_scn: Option<Scn>,
    pub state: TransactionState,
    pub flags: TransactionFlags,
    pub record_count: usize,
    /// Chunk ids in append order; `chunk_ids[0]` is the head, the last
    /// entry is the tail.
    pub chunk_ids: Vec<usize>,
}

impl Transaction {
    pub fn new(xid: Xid, first_sequence: u32, first_scn: Scn) -> Transaction {
        Transaction {
            xid,
            first_sequence,
            first_scn,
            commit_scn: None,
            state: TransactionState::Open,
            flags: TransactionFlags::default(),
            record_count: 0,
            chunk_ids: Vec::new(),
        }
    }
}
