//! Core identifiers from spec.md §3: XID, UBA, DBA, ROWID and friends.
//! Grounded in `original_source/src/types.h`'s `XID`/`PRINTXID`/`PRINTUBA`
//! macros and `original_source/src/common/types/RowId.h`'s base64 encoding.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Transaction id: `(undo-segment, slot, sqn)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Xid {
    pub usn: u16,
    pub slt: u8,
    pub sqn: u32,
}

impl Xid {
    pub fn new(usn: u16, slt: u8, sqn: u32) -> Self {
        Xid { usn, slt, sqn }
    }
}

impl fmt::Display for Xid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}.{:03x}.{:08x}", self.usn, self.slt, self.sqn)
    }
}

/// Undo block address: locates an undo record within the undo tablespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Uba {
    pub block: u32,
    pub sequence: u16,
    pub record: u8,
}

impl fmt::Display for Uba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}.{:04x}.{:02x}", self.block, self.sequence, self.record)
    }
}

/// Data block address: `(file-number, block-number)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dba {
    pub file_number: u16,
    pub block_number: u32,
}

/// Key used by the rollback matcher to pair a cancelling 5.4/5.5 record
/// with the record pair it cancels: `(uba_block, slot, rci)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RollbackKey {
    pub uba_block: u32,
    pub slot: u16,
    pub rci: u8,
}

/// Physical row address: `(data-object-id, file-number, block-number, slot)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowId {
    pub data_obj: u32,
    pub dba: Dba,
    pub slot: u16,
}

const BASE64_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

impl RowId {
    /// Encodes as the classic 18-character ROWID base64 form, per
    /// spec.md §6's output contract.
    pub fn encode(&self) -> String {
        let afn = self.dba.file_number as u64;

        let mut out = String::with_capacity(18);
        // data object: 6 chars / 36 bits
        for i in (0..6).rev() {
            let shift = i * 6;
            let idx = ((self.data_obj as u64) >> shift) & 0x3F;
            out.push(BASE64_ALPHABET[idx as usize] as char);
        }
        // file number (afn): 3 chars / 18 bits
        for i in (0..3).rev() {
            let shift = i * 6;
            let idx = (afn >> shift) & 0x3F;
            out.push(BASE64_ALPHABET[idx as usize] as char);
        }
        // block number within file: 6 chars / 36 bits, low 22 bits only
        // (high bits belong to afn in the packed physical form)
        let block_low = self.dba.block_number & 0x3FFFFF;
        for i in (0..6).rev() {
            let shift = i * 6;
            let idx = (block_low as u64 >> shift) & 0x3F;
            out.push(BASE64_ALPHABET[idx as usize] as char);
        }
        // slot: 3 chars / 18 bits
        for i in (0..3).rev() {
            let shift = i * 6;
            let idx = (self.slot as u64 >> shift) & 0x3F;
            out.push(BASE64_ALPHABET[idx as usize] as char);
        }
        out
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

/// Logical object identifier (OBJ). Physical object identifiers
/// (DATAOBJ) are tracked separately on `RowId`/`SchemaObject` since a
/// partitioned table has one OBJ but many DATAOBJ values.
pub type ObjId = u32;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xid_display_matches_usn_slt_sqn_format() {
        let xid = Xid::new(1, 2, 7);
        assert_eq!(xid.to_string(), "0001.002.00000007");
    }

    #[test]
    fn rowid_encode_is_18_chars() {
        let r = RowId {
            data_obj: 10001,
            dba: Dba { file_number: 4, block_number: 55 },
            slot: 0,
        };
        assert_eq!(r.encode().len(), 18);
    }
}
