//! Transaction chunk: a fixed-size arena slice (spec.md §4.5) holding a
//! sequence of undo/redo record pairs. Owned exclusively by the
//! transaction buffer's arena; transactions reference chunks by index
//! rather than by pointer, per the REDESIGN FLAGS note on breaking the
//! cyclic Transaction<->chunk-list ownership the source models with raw
//! pointers.

use crate::ids::RollbackKey;
use crate::record::RedoLogRecord;

pub const CHUNK_CAPACITY_BYTES: usize = 65_536;

/// An undo/redo record pair as stored in the buffer (spec.md §3: "stores
/// `(undo-record-header, redo-record-header, payload bytes)` triples").
#[derive(Debug, Clone)]
pub struct RecordPair {
    pub undo: Option<RedoLogRecord>,
    pub redo: Option<RedoLogRecord>,
}

impl RecordPair {
    pub fn rollback_key(&self) -> Option<RollbackKey> {
        let uba = self.undo.as_ref()?.uba?;
        let slot = self.undo.as_ref()?.slot;
        let rci = self.undo.as_ref()?.rci;
        Some(RollbackKey { uba_block: uba.block, slot, rci })
    }

    /// Approximate footprint used to budget chunk capacity; doesn't need
    /// to be exact, only monotone in payload size.
    pub fn approx_size(&self) -> usize {
        let mut size = 64; // header overhead for the pair
        if let Some(u) = &self.undo {
            size += u.columns.iter().map(|c| c.bytes.len()).sum::<usize>();
        }
        if let Some(r) = &self.redo {
            size += r.columns.iter().map(|c| c.bytes.len()).sum::<usize>();
        }
        size
    }
}

#[derive(Debug)]
pub struct Chunk {
    pub id: usize,
    pairs: Vec<RecordPair>,
    used_bytes: usize,
    pub next: Option<usize>,
}

impl Chunk {
    pub fn new(id: usize) -> Chunk {
        Chunk { id, pairs: Vec::new(), used_bytes: 0, next: None }
    }

    pub fn remaining(&self) -> usize {
        CHUNK_CAPACITY_BYTES.saturating_sub(self.used_bytes)
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn pairs(&self) -> &[RecordPair] {
        &self.pairs
    }

    /// Appends `pair` if it fits; returns it back unchanged if not so the
    /// caller can allocate a new chunk instead.
    pub fn try_append(&mut self, pair: RecordPair) -> Result<(), RecordPair> {
        let size = pair.approx_size();
        if size > self.remaining() {
            return Err(pair);
        }
        self.used_bytes += size;
        self.pairs.push(pair);
        Ok(())
    }

    /// Walks the chunk backward looking for a pair whose undo record's
    /// `(uba_block, slot, rci)` matches `key`; removes and returns it.
    /// Partial rollback only ever searches the tail chunk (spec.md
    /// §4.5: "at most one chunk is searched").
    pub fn pop_last_matching(&mut self, key: RollbackKey) -> Option<RecordPair> {
        let pos = self.pairs.iter().rposition(|p| p.rollback_key() == Some(key))?;
        let pair = self.pairs.remove(pos);
        self.used_bytes = self.used_bytes.saturating_sub(pair.approx_size());
        Some(pair)
    }

    pub fn reset(&mut self) {
        self.pairs.clear();
        self.used_bytes = 0;
        self.next = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{Dba, Uba, Xid};
    use crate::primitives::Scn;
    use crate::record::opcode::{OpcodeTag, RowFlags, VectorKind};

    fn record_with_uba(uba: Uba, slot: u16, rci: u8) -> RedoLogRecord {
        RedoLogRecord {
            xid: Xid::new(0, 0, 0),
            scn: Scn(0),
            subscn: 0,
            seq: 0,
            obj: 0,
            dba: Dba { file_number: 0, block_number: 0 },
            slot,
            uba: Some(uba),
            itli: None,
            rci,
            kind: VectorKind::Unknown(OpcodeTag { major: 0, minor: 0 }),
            flags: RowFlags::default(),
            begin: false,
            commit: false,
            rollback: false,
            columns: Vec::new(),
            undo_columns: Vec::new(),
            supplemental: Vec::new(),
            null_bitmap: Vec::new(),
            multi_row: Vec::new(),
            ddl: None,
        }
    }

    #[test]
    fn append_and_pop_last_matching() {
        let mut chunk = Chunk::new(0);
        let uba = Uba { block: 5, sequence: 1, record: 0 };
        let pair = RecordPair { undo: Some(record_with_uba(uba, 9, 2)), redo: None };
        chunk.try_append(pair).unwrap();
        assert!(!chunk.is_empty());

        let popped = chunk.pop_last_matching(RollbackKey { uba_block: 5, slot: 9, rci: 2 });
        assert!(popped.is_some());
        assert!(chunk.is_empty());
    }

    #[test]
    fn append_fails_when_chunk_full() {
        let mut chunk = Chunk::new(0);
        chunk.used_bytes = CHUNK_CAPACITY_BYTES;
        let pair = RecordPair { undo: None, redo: None };
        assert!(chunk.try_append(pair).is_err());
    }
}
