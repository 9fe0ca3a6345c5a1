//! System-table mutation tracker (spec.md §4.10): intercepts changes to
//! dictionary tables inside a normal transaction and, on commit,
//! reapplies them to the in-memory schema so DDL performed during the
//! captured stream is reflected in subsequent decodes.

use std::collections::HashMap;

use crate::error::CResult;
use crate::ids::{ObjId, RowId, Xid};
use crate::primitives::Scn;
use crate::record::RedoLogRecord;
use crate::schema::{
    CatalogOp, CatalogRow, CatalogTableKind, SchemaDictionary, SysCCol, SysCDef, SysCol, SysLob,
    SysObj, SysTab, SysTabComPart, SysTabPart, SysTabSubPart, SysUser,
};

/// Staged catalog mutations for one open transaction, applied to the
/// dictionary atomically on commit, discarded on rollback.
#[derive(Default)]
struct SchemaDelta {
    rows: Vec<(CatalogOp, CatalogRow)>,
}

#[derive(Default)]
pub struct SystemTableMutationTracker {
    staging: HashMap<Xid, SchemaDelta>,
}

impl SystemTableMutationTracker {
    pub fn new() -> SystemTableMutationTracker {
        SystemTableMutationTracker::default()
    }

    /// Returns `true` if `obj` is a catalog table and the record was
    /// staged; the assembler calls this for every row change before
    /// treating it as an ordinary user-table event.
    pub fn observe(&mut self, xid: Xid, dict: &SchemaDictionary, record: &RedoLogRecord) -> CResult<bool> {
        let Some(kind) = dict.catalog_kind_of(record.obj) else {
            return Ok(false);
        };
        let op = if record.flags.deleted { CatalogOp::Delete } else { CatalogOp::Insert };
        let row = decode_catalog_row(kind, record)?;
        self.staging.entry(xid).or_default().rows.push((op, row));
        Ok(true)
    }

    /// Applies the staged delta to the dictionary under `scn`, producing
    /// a new immutable snapshot. No-op if this transaction staged no
    /// catalog changes.
    pub fn commit(&mut self, xid: Xid, dict: &mut SchemaDictionary, scn: Scn) -> bool {
        let Some(delta) = self.staging.remove(&xid) else { return false };
        if delta.rows.is_empty() {
            return false;
        }
        let mut affected: Vec<ObjId> = Vec::new();
        for (op, row) in delta.rows {
            if let Some(obj) = row_obj(&row) {
                affected.push(obj);
            }
            let _ = dict.apply_dictionary_change(op, row);
        }
        dict.rebuild_indexes(Some(&affected), scn);
        true
    }

    pub fn discard(&mut self, xid: Xid) {
        self.staging.remove(&xid);
    }

    pub fn is_dictionary_change(&self, xid: Xid) -> bool {
        self.staging.get(&xid).map(|d| !d.rows.is_empty()).unwrap_or(false)
    }
}

fn row_obj(row: &CatalogRow) -> Option<ObjId> {
    match row {
        CatalogRow::Obj(r) => Some(r.obj),
        CatalogRow::Tab(r) => Some(r.obj),
        CatalogRow::Col(r) => Some(r.obj),
        CatalogRow::CDef(r) => Some(r.obj),
        CatalogRow::TabPart(r) => Some(r.obj),
        CatalogRow::TabComPart(r) => Some(r.obj),
        CatalogRow::TabSubPart(r) => Some(r.obj),
        CatalogRow::Lob(r) => Some(r.obj),
        CatalogRow::User(_) | CatalogRow::CCol(_) => None,
    }
}

fn row_id_of(record: &RedoLogRecord) -> RowId {
    RowId { data_obj: record.obj, dba: record.dba, slot: record.slot }
}

fn col_str(record: &RedoLogRecord, idx: usize) -> String {
    record.columns.get(idx).map(|c| String::from_utf8_lossy(&c.bytes).into_owned()).unwrap_or_default()
}

fn col_u32(record: &RedoLogRecord, idx: usize) -> u32 {
    record
        .columns
        .get(idx)
        .filter(|c| c.bytes.len() >= 4)
        .map(|c| u32::from_le_bytes([c.bytes[0], c.bytes[1], c.bytes[2], c.bytes[3]]))
        .unwrap_or(0)
}

fn col_i16(record: &RedoLogRecord, idx: usize) -> i16 {
    record
        .columns
        .get(idx)
        .filter(|c| c.bytes.len() >= 2)
        .map(|c| i16::from_le_bytes([c.bytes[0], c.bytes[1]]))
        .unwrap_or(0)
}

fn col_u16(record: &RedoLogRecord, idx: usize) -> u16 {
    record
        .columns
        .get(idx)
        .filter(|c| c.bytes.len() >= 2)
        .map(|c| u16::from_le_bytes([c.bytes[0], c.bytes[1]]))
        .unwrap_or(0)
}

/// Decodes one catalog-table row from its column images, assuming a
/// fixed column ordinal layout per table matching `original_source`'s
/// `common/table/*.h` field order.
fn decode_catalog_row(kind: CatalogTableKind, record: &RedoLogRecord) -> CResult<CatalogRow> {
    let row_id = row_id_of(record);
    Ok(match kind {
        CatalogTableKind::User => CatalogRow::User(SysUser {
            row_id,
            user_id: col_u32(record, 0),
            name: col_str(record, 1),
        }),
        CatalogTableKind::Obj => CatalogRow::Obj(SysObj {
            row_id,
            owner_id: col_u32(record, 0),
            obj: col_u32(record, 1),
            data_obj: col_u32(record, 2),
            name: col_str(record, 3),
            obj_type: col_u16(record, 4),
        }),
        CatalogTableKind::Tab => CatalogRow::Tab(SysTab {
            row_id,
            obj: col_u32(record, 0),
            data_obj: col_u32(record, 1),
            clu_cols: col_i16(record, 2),
        }),
        CatalogTableKind::Col => CatalogRow::Col(SysCol {
            row_id,
            obj: col_u32(record, 0),
            col_no: col_i16(record, 1),
            seg_col_no: col_i16(record, 2),
            name: col_str(record, 3),
            type_no: col_u16(record, 4),
            length: col_u32(record, 5),
            precision: None,
            scale: None,
            charset_id: col_u32(record, 6),
            nullable: col_i16(record, 7) == 0,
        }),
        CatalogTableKind::CDef => CatalogRow::CDef(SysCDef {
            row_id,
            con: col_u32(record, 0),
            obj: col_u32(record, 1),
            con_type: record.columns.get(2).and_then(|c| c.bytes.first()).copied().unwrap_or(0),
        }),
        CatalogTableKind::CCol => CatalogRow::CCol(SysCCol {
            row_id,
            con: col_u32(record, 0),
            col_no: col_i16(record, 1),
            position: col_u16(record, 2),
        }),
        CatalogTableKind::TabPart => CatalogRow::TabPart(SysTabPart {
            row_id,
            obj: col_u32(record, 0),
            data_obj: col_u32(record, 1),
            base_obj: col_u32(record, 2),
        }),
        CatalogTableKind::TabComPart => CatalogRow::TabComPart(SysTabComPart {
            row_id,
            obj: col_u32(record, 0),
            base_obj: col_u32(record, 1),
        }),
        CatalogTableKind::TabSubPart => CatalogRow::TabSubPart(SysTabSubPart {
            row_id,
            obj: col_u32(record, 0),
            data_obj: col_u32(record, 1),
            pobj: col_u32(record, 2),
        }),
        CatalogTableKind::Lob => CatalogRow::Lob(SysLob {
            row_id,
            obj: col_u32(record, 0),
            col_no: col_i16(record, 1),
            lob_obj: col_u32(record, 2),
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::Dba;
    use crate::record::opcode::{OpcodeTag, RowFlags, VectorKind};
    use crate::record::ColumnImage;

    fn blank_record(obj: u32, columns: Vec<ColumnImage>) -> RedoLogRecord {
        RedoLogRecord {
            xid: Xid::new(0, 0, 0),
            scn: Scn(1),
            subscn: 0,
            seq: 0,
            obj,
            dba: Dba { file_number: 1, block_number: 1 },
            slot: 0,
            uba: None,
            itli: None,
            rci: 0,
            kind: VectorKind::RowInsert,
            flags: RowFlags::default(),
            begin: false,
            commit: false,
            rollback: false,
            columns,
            undo_columns: Vec::new(),
            supplemental: Vec::new(),
            null_bitmap: Vec::new(),
            multi_row: Vec::new(),
            ddl: None,
        }
    }

    #[test]
    fn observe_stages_and_commit_applies() {
        let mut dict = SchemaDictionary::new(false);
        let mut kinds = HashMap::new();
        kinds.insert(500u32, CatalogTableKind::User);
        dict.register_catalog_objects(kinds);

        let mut tracker = SystemTableMutationTracker::new();
        let xid = Xid::new(1, 2, 3);
        let record = blank_record(500, vec![
            ColumnImage { seg_col_no: 0, bytes: 7u32.to_le_bytes().to_vec() },
            ColumnImage { seg_col_no: 1, bytes: b"HR".to_vec() },
        ]);
        assert!(tracker.observe(xid, &dict, &record).unwrap());
        assert!(tracker.is_dictionary_change(xid));
        assert!(tracker.commit(xid, &mut dict, Scn(2)));
        assert!(!tracker.is_dictionary_change(xid));
    }

    #[test]
    fn non_catalog_object_is_not_observed() {
        let dict = SchemaDictionary::new(false);
        let mut tracker = SystemTableMutationTracker::new();
        let record = blank_record(999, vec![]);
        assert!(!tracker.observe(Xid::new(0, 0, 0), &dict, &record).unwrap());
    }
}
