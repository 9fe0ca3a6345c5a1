//! Closed opcode classification (spec.md §9 REDESIGN FLAGS: "replace
//! virtual `process()` dispatch on opcode classes with a tagged union...
//! The union is closed; unknown opcodes produce an `Unknown` variant").

/// Raw `major.minor` opcode pair as it appears in a change vector header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeTag {
    pub major: u8,
    pub minor: u8,
}

impl std::fmt::Display for OpcodeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// What kind of change vector this is, after classifying its
/// `OpcodeTag`. Each variant is handled by its own pure decode function
/// in `record::parse` rather than by dynamic dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorKind {
    /// 5.1: transaction control (KTB) fields.
    Ktb,
    /// 5.4 / 5.5: partial rollback.
    RollbackPartial,
    /// 9.2: transaction commit marker.
    Commit,
    /// 11.2: insert row piece.
    RowInsert,
    /// 11.3: delete row piece.
    RowDelete,
    /// 11.5: update row piece.
    RowUpdate,
    /// 11.6: overwrite row piece.
    RowOverwrite,
    /// 11.11: multi-row insert.
    MultiRowInsert,
    /// 11.12: multi-row delete.
    MultiRowDelete,
    /// 24.1: DDL.
    Ddl,
    /// 23.x: supplemental-log columns trailing the row-change vectors.
    Supplemental,
    /// Any opcode this engine does not interpret.
    Unknown(OpcodeTag),
}

impl VectorKind {
    pub fn classify(tag: OpcodeTag) -> VectorKind {
        match (tag.major, tag.minor) {
            (5, 1) => VectorKind::Ktb,
            (5, 4) | (5, 5) => VectorKind::RollbackPartial,
            (9, 2) => VectorKind::Commit,
            (11, 2) => VectorKind::RowInsert,
            (11, 3) => VectorKind::RowDelete,
            (11, 5) => VectorKind::RowUpdate,
            (11, 6) => VectorKind::RowOverwrite,
            (11, 11) => VectorKind::MultiRowInsert,
            (11, 12) => VectorKind::MultiRowDelete,
            (24, 1) => VectorKind::Ddl,
            (23, _) => VectorKind::Supplemental,
            _ => VectorKind::Unknown(tag),
        }
    }

    pub fn is_row_change(self) -> bool {
        matches!(
            self,
            VectorKind::RowInsert
                | VectorKind::RowDelete
                | VectorKind::RowUpdate
                | VectorKind::RowOverwrite
                | VectorKind::MultiRowInsert
                | VectorKind::MultiRowDelete
        )
    }
}

/// Row-piece flag byte bits (spec.md §4.4: "flag byte F/L/N/P/H/C/K/D
/// indicating row-piece position and type").
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowFlags {
    /// F: first (head) piece.
    pub head: bool,
    /// L: last piece.
    pub last: bool,
    /// N: null row.
    pub null_row: bool,
    /// P: continuation piece.
    pub continuation: bool,
    /// H: head of a row chain.
    pub chain_head: bool,
    /// C: clustered key.
    pub cluster_key: bool,
    /// K: KTB redo present.
    pub ktb_redo: bool,
    /// D: deleted row.
    pub deleted: bool,
}

impl RowFlags {
    pub fn from_byte(b: u8) -> RowFlags {
        RowFlags {
            head: b & 0x01 != 0,
            last: b & 0x02 != 0,
            null_row: b & 0x04 != 0,
            continuation: b & 0x08 != 0,
            chain_head: b & 0x10 != 0,
            cluster_key: b & 0x20 != 0,
            ktb_redo: b & 0x40 != 0,
            deleted: b & 0x80 != 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_opcodes() {
        assert_eq!(VectorKind::classify(OpcodeTag { major: 11, minor: 2 }), VectorKind::RowInsert);
        assert_eq!(VectorKind::classify(OpcodeTag { major: 24, minor: 1 }), VectorKind::Ddl);
    }

    #[test]
    fn supplemental_log_vectors_classify_by_major_only() {
        assert_eq!(VectorKind::classify(OpcodeTag { major: 23, minor: 1 }), VectorKind::Supplemental);
        assert_eq!(VectorKind::classify(OpcodeTag { major: 23, minor: 7 }), VectorKind::Supplemental);
    }

    #[test]
    fn unknown_opcode_is_closed_variant() {
        let tag = OpcodeTag { major: 99, minor: 9 };
        assert_eq!(VectorKind::classify(tag), VectorKind::Unknown(tag));
    }

    #[test]
    fn row_flags_decode_head_and_last() {
        let f = RowFlags::from_byte(0x03);
        assert!(f.head);
        assert!(f.last);
        assert!(!f.deleted);
    }
}
