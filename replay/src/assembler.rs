//! Transaction assembler (spec.md §4.8): on commit, walks a
//! transaction's chunk list in order, pairs undo+redo vectors, and
//! streams logical insert/update/delete/DDL events to the output
//! buffer. On rollback, discards chunks without emitting user-visible
//! events unless `flags.show-incomplete-transactions` is set.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::{ColumnFormat, ReplayConfig};
use crate::error::CResult;
use crate::event::{ColumnMap, OperationKind, OutputEvent};
use crate::ids::Xid;
use crate::output::OutputBuffer;
use crate::primitives::Scn;
use crate::record::opcode::VectorKind;
use crate::record::{ColumnImage, RedoLogRecord};
use crate::schema::{decode_column, ColumnValue, Schema, SchemaDictionary};
use crate::system_tracker::SystemTableMutationTracker;
use crate::txn::{RecordPair, TransactionBuffer};

pub struct Assembler<'a> {
    pub buffer: &'a mut TransactionBuffer,
    pub dictionary: &'a mut SchemaDictionary,
    pub tracker: &'a mut SystemTableMutationTracker,
    pub output: Arc<OutputBuffer>,
    pub config: &'a ReplayConfig,
}

fn now_iso8601() -> String {
    // Timestamps are stamped by the caller at the replay-loop boundary in
    // production (the commit SCN's associated redo timestamp); here we
    // emit a placeholder the writer overwrites, since the only source of
    // wall-clock time available to this engine is the log stream itself.
    "1970-01-01T00:00:00Z".to_string()
}

impl<'a> Assembler<'a> {
    /// Invoked when a commit (9.2) record for `xid` is consumed.
    pub fn commit(&mut self, xid: Xid, commit_scn: Scn) -> CResult<()> {
        let schema = self.dictionary.snapshot_at(commit_scn);
        let pairs = self.buffer.drain(xid);

        for pair in pairs {
            if let Some(redo) = &pair.redo {
                if self.tracker.observe(xid, &*self.dictionary, redo)? {
                    continue;
                }
            }
            self.emit_pair(&schema, xid, commit_scn, &pair)?;
        }

        self.tracker.commit(xid, &mut *self.dictionary, commit_scn);

        let event = OutputEvent::commit_marker(xid, commit_scn, now_iso8601());
        self.output.push_event(&event, &self.config.format)?;
        Ok(())
    }

    /// Invoked when a rollback (5.4, transaction-level) record for `xid`
    /// is consumed.
    pub fn rollback(&mut self, xid: Xid, scn: Scn) -> CResult<()> {
        self.buffer.drain(xid);
        self.tracker.discard(xid);
        if self.config.flags.show_incomplete_transactions {
            let event = OutputEvent::rollback_notice(xid, scn, now_iso8601());
            self.output.push_event(&event, &self.config.format)?;
        }
        Ok(())
    }

    /// A transaction hit the arena cap mid-stream: emit a gap marker at
    /// commit instead of partial, possibly-inconsistent row events.
    pub fn commit_overflowed(&mut self, xid: Xid, commit_scn: Scn) -> CResult<()> {
        self.buffer.drain(xid);
        self.tracker.discard(xid);
        let event = OutputEvent::gap(xid, commit_scn, now_iso8601());
        self.output.push_event(&event, &self.config.format)
    }

    fn emit_pair(&self, schema: &Arc<Schema>, xid: Xid, commit_scn: Scn, pair: &RecordPair) -> CResult<()> {
        match &pair.redo {
            Some(redo) if redo.kind == VectorKind::MultiRowInsert || redo.kind == VectorKind::MultiRowDelete => {
                self.emit_multi_row(schema, xid, commit_scn, redo)
            }
            Some(redo) if redo.ddl.is_some() => self.emit_ddl(xid, commit_scn, redo),
            Some(redo) => self.emit_single_row(schema, xid, commit_scn, pair.undo.as_ref(), redo),
            None => Ok(()),
        }
    }

    fn emit_ddl(&self, xid: Xid, commit_scn: Scn, redo: &RedoLogRecord) -> CResult<()> {
        let ddl = redo.ddl.as_ref().expect("checked by caller");
        let event = OutputEvent {
            op: OperationKind::Ddl,
            owner: Some(ddl.owner.clone()),
            table: Some(ddl.table.clone()),
            row_id: None,
            before: None,
            after: None,
            scn: commit_scn,
            commit_timestamp: now_iso8601(),
            xid: xid.to_string(),
            ddl_text: Some(ddl.sql_text.clone()),
        };
        self.output.push_event(&event, &self.config.format)
    }

    fn emit_single_row(
        &self,
        schema: &Arc<Schema>,
        xid: Xid,
        commit_scn: Scn,
        undo: Option<&RedoLogRecord>,
        redo: &RedoLogRecord,
    ) -> CResult<()> {
        let Some(table) = schema.find_table(redo.obj) else {
            return Ok(()); // SchemaMiss: skip, not fatal (spec.md §7)
        };

        let op = match redo.kind {
            VectorKind::RowInsert => OperationKind::Insert,
            VectorKind::RowDelete => OperationKind::Delete,
            _ => OperationKind::Update,
        };

        let full_image = match self.config.format.column {
            ColumnFormat::ChangedOnly => false,
            ColumnFormat::FullInsertDelete => matches!(op, OperationKind::Insert | OperationKind::Delete),
            ColumnFormat::FullUpdate => matches!(op, OperationKind::Update),
        };

        let after = if matches!(op, OperationKind::Delete) {
            None
        } else {
            Some(build_column_map(table, &redo.columns, &redo.supplemental, &redo.null_bitmap, full_image))
        };
        let before = match (op, undo) {
            (OperationKind::Insert, _) => None,
            (_, Some(u)) => Some(build_column_map(table, &u.columns, &redo.supplemental, &u.null_bitmap, full_image)),
            (_, None) => None,
        };

        let row_id = crate::ids::RowId { data_obj: redo.obj, dba: redo.dba, slot: redo.slot };
        let event = OutputEvent {
            op,
            owner: Some(table.owner.clone()),
            table: Some(table.name.clone()),
            row_id: Some(row_id.encode()),
            before,
            after,
            scn: commit_scn,
            commit_timestamp: now_iso8601(),
            xid: xid.to_string(),
            ddl_text: None,
        };
        self.output.push_event(&event, &self.config.format)
    }

    fn emit_multi_row(&self, schema: &Arc<Schema>, xid: Xid, commit_scn: Scn, redo: &RedoLogRecord) -> CResult<()> {
        let Some(table) = schema.find_table(redo.obj) else { return Ok(()) };
        let op = if redo.kind == VectorKind::MultiRowInsert { OperationKind::Insert } else { OperationKind::Delete };
        let full_image = matches!(self.config.format.column, ColumnFormat::FullInsertDelete);
        for row in &redo.multi_row {
            let columns = build_column_map(table, &row.columns, &[], &[], full_image);
            let row_id = crate::ids::RowId { data_obj: redo.obj, dba: redo.dba, slot: row.slot };
            let event = OutputEvent {
                op,
                owner: Some(table.owner.clone()),
                table: Some(table.name.clone()),
                row_id: Some(row_id.encode()),
                before: if op == OperationKind::Delete { Some(columns.clone()) } else { None },
                after: if op == OperationKind::Insert { Some(columns) } else { None },
                scn: commit_scn,
                commit_timestamp: now_iso8601(),
                xid: xid.to_string(),
                ddl_text: None,
            };
            self.output.push_event(&event, &self.config.format)?;
        }
        Ok(())
    }
}

/// Builds one event's column map. `full_image` selects between spec.md
/// §4.8.c's two outcomes for a column absent from both the record's own
/// images and its supplemental-log columns: omitted (`false`,
/// update-only-changed) or emitted as NULL (`true`, full-image), per the
/// `format.column` config knob resolved by the caller.
fn build_column_map(
    table: &crate::schema::SchemaObject,
    columns: &[ColumnImage],
    supplemental: &[ColumnImage],
    null_bitmap: &[bool],
    full_image: bool,
) -> ColumnMap {
    let mut map: ColumnMap = BTreeMap::new();
    for col in &table.columns {
        let image = columns
            .iter()
            .find(|c| c.seg_col_no == col.seg_col_no)
            .or_else(|| supplemental.iter().find(|c| c.seg_col_no == col.seg_col_no));

        let value = match image {
            Some(img) => decode_column(col.col_type, &img.bytes).unwrap_or(ColumnValue::Null),
            None => {
                let is_null = null_bitmap.get(col.seg_col_no.max(0) as usize).copied().unwrap_or(false);
                if is_null || full_image {
                    ColumnValue::Null
                } else {
                    continue; // absent from both sources: update-only-changed, omit
                }
            }
        };
        map.insert(col.name.clone(), value);
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::column::{ColumnType, SchemaColumn};
    use crate::schema::SchemaObject;

    fn table_with_two_columns() -> SchemaObject {
        let col = |name: &str, seg_col_no: i16| SchemaColumn {
            col_no: seg_col_no + 1,
            seg_col_no,
            name: name.to_string(),
            col_type: ColumnType::Number,
            length: 22,
            precision: None,
            scale: None,
            pk_ordinal: if seg_col_no == 0 { Some(1) } else { None },
            charset_id: 0,
            nullable: seg_col_no != 0,
            supplemental_log: false,
        };
        SchemaObject {
            obj: 10001,
            data_obj: 10001,
            owner: "HR".to_string(),
            name: "EMP".to_string(),
            columns: vec![col("ID", 0), col("SAL", 1)],
            base_obj: None,
        }
    }

    #[test]
    fn changed_only_omits_absent_column() {
        let table = table_with_two_columns();
        let id_only = [ColumnImage { seg_col_no: 0, bytes: vec![0x80] }];
        let map = build_column_map(&table, &id_only, &[], &[], false);
        assert_eq!(map.len(), 1);
        assert!(map.contains_key("ID"));
        assert!(!map.contains_key("SAL"));
    }

    #[test]
    fn full_image_nulls_out_absent_column() {
        let table = table_with_two_columns();
        let id_only = [ColumnImage { seg_col_no: 0, bytes: vec![0x80] }];
        let map = build_column_map(&table, &id_only, &[], &[], true);
        assert_eq!(map.len(), 2);
        assert_eq!(map["SAL"], ColumnValue::Null);
    }

    #[test]
    fn supplemental_column_fills_in_ahead_of_absence() {
        let table = table_with_two_columns();
        let redo_cols = [ColumnImage { seg_col_no: 1, bytes: vec![0x80] }];
        let supplemental = [ColumnImage { seg_col_no: 0, bytes: vec![0x80] }];
        let map = build_column_map(&table, &redo_cols, &supplemental, &[], false);
        assert_eq!(map.len(), 2);
        assert!(map.contains_key("ID"));
    }
}
