//! Opcode parser (spec.md §4.4): decodes one logical record's bytes into
//! a uniform `RedoLogRecord`.
//!
//! A record is a 24-byte header followed by one or more change vectors,
//! each a 16-byte vector header `(major:u8, minor:u8, afn:u16, dba:u32,
//! scn_or_sequence:u64)` followed by a field table (`field_reader`). Per
//! Open Question 1, block-cleanout and cluster-key payload byte offsets
//! are not re-derived here without a hex-dump fixture to check against;
//! those vectors are recognized (flags preserved) but their field
//! contents beyond the head piece are not interpreted, matching spec.md
//! §4.4's "emit the head piece only; ignore `P`/`N` continuation pieces".

pub mod ddl;
pub mod field_reader;
pub mod opcode;

use crate::error::{CResult, Error};
use crate::ids::{Dba, ObjId, Uba, Xid};
use crate::primitives::{read_scn, read_u16, read_u32, read_u64, read_u8, ByteOrder, Scn};
use ddl::{DdlFields, DdlKind};
use field_reader::FieldReader;
use opcode::{OpcodeTag, RowFlags, VectorKind};

pub const RECORD_HEADER_LEN: usize = 24;
pub const VECTOR_HEADER_LEN: usize = 16;

#[derive(Debug, Clone)]
pub struct ColumnImage {
    pub seg_col_no: i16,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct MultiRowSlot {
    pub slot: u16,
    pub columns: Vec<ColumnImage>,
}

/// One decoded logical record: the outcome of classifying and decoding
/// every change vector a physical record carries. KTB (transaction
/// control) and KDO (row data) vectors sharing one record are merged
/// here -- spec.md §4.4: "these are the common update case and are
/// paired immediately inside the record, not across records."
#[derive(Debug, Clone)]
pub struct RedoLogRecord {
    pub xid: Xid,
    pub scn: Scn,
    pub subscn: u16,
    pub seq: u8,
    pub obj: ObjId,
    pub dba: Dba,
    pub slot: u16,
    pub uba: Option<Uba>,
    pub itli: Option<u8>,
    /// Rollback-change-index: part of the rollback matcher's key
    /// alongside `(uba.block, slot)`.
    pub rci: u8,
    pub kind: VectorKind,
    pub flags: RowFlags,
    pub begin: bool,
    pub commit: bool,
    pub rollback: bool,
    pub columns: Vec<ColumnImage>,
    /// Before-image columns carried by this record's own KTB (5.1) vector,
    /// when Oracle packs them alongside the redo image rather than
    /// requiring a separate undo record (spec.md §4.4's "paired
    /// immediately inside the record" case). Empty when the undo side
    /// carries no explicit column data of its own (inserts, and deletes
    /// whose KDO vector already carries the full pre-change row).
    pub undo_columns: Vec<ColumnImage>,
    pub supplemental: Vec<ColumnImage>,
    pub null_bitmap: Vec<bool>,
    pub multi_row: Vec<MultiRowSlot>,
    pub ddl: Option<DdlFields>,
}

impl RedoLogRecord {
    fn blank(xid: Xid, scn: Scn, subscn: u16, seq: u8) -> RedoLogRecord {
        RedoLogRecord {
            xid,
            scn,
            subscn,
            seq,
            obj: 0,
            dba: Dba { file_number: 0, block_number: 0 },
            slot: 0,
            uba: None,
            itli: None,
            rci: 0,
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
}

struct RecordHeader {
    #[allow(dead_code)]
    length: u32,
    scn: Scn,
    subscn: u16,
    seq: u8,
    #[allow(dead_code)]
    typ: u8,
}

fn parse_record_header(buf: &[u8], order: ByteOrder) -> CResult<RecordHeader> {
    if buf.len() < RECORD_HEADER_LEN {
        return Err(Error::CorruptLog(format!(
            "record header needs {RECORD_HEADER_LEN} bytes, got {}",
            buf.len()
        )));
    }
    let length = read_u32(buf, 0, order)?;
    let vld = read_u8(buf, 4)?;
    let scn = read_scn(buf, 5, order, vld)?;
    let subscn = read_u16(buf, 13, order)?;
    let seq = read_u8(buf, 15)?;
    let typ = read_u8(buf, 16)?;
    Ok(RecordHeader { length, scn, subscn, seq, typ })
}

struct VectorHeader {
    tag: OpcodeTag,
    dba: u32,
    scn_or_sequence: Scn,
}

fn parse_vector_header(buf: &[u8], offset: usize, order: ByteOrder) -> CResult<VectorHeader> {
    if buf.len() < offset + VECTOR_HEADER_LEN {
        return Err(Error::CorruptLog(format!(
            "vector header needs {VECTOR_HEADER_LEN} bytes at offset {offset}, buf_len={}",
            buf.len()
        )));
    }
    let major = read_u8(buf, offset)?;
    let minor = read_u8(buf, offset + 1)?;
    let _afn = read_u16(buf, offset + 2, order)?;
    let dba = read_u32(buf, offset + 4, order)?;
    let scn_or_sequence = Scn(read_u64(buf, offset + 8, order)?);
    Ok(VectorHeader { tag: OpcodeTag { major, minor }, dba, scn_or_sequence })
}

/// Parses one logical record (already reassembled across blocks by the
/// log reader) into a `RedoLogRecord`. `strict` controls whether an
/// unrecognized opcode is fatal (`Error::CorruptLog`) or merely skipped.
pub fn parse_record(buf: &[u8], order: ByteOrder, strict: bool) -> CResult<RedoLogRecord> {
    let header = parse_record_header(buf, order)?;
    let mut record = RedoLogRecord::blank(Xid::new(0, 0, 0), header.scn, header.subscn, header.seq);

    let mut cursor = RECORD_HEADER_LEN;
    while cursor + VECTOR_HEADER_LEN <= buf.len() {
        let vh = parse_vector_header(buf, cursor, order)?;
        let field_table_offset = cursor + VECTOR_HEADER_LEN;
        let fields = FieldReader::parse(buf, field_table_offset, order)?;
        let kind = VectorKind::classify(vh.tag);

        match kind {
            VectorKind::Ktb => apply_ktb(&mut record, &fields)?,
            VectorKind::RollbackPartial => {
                record.rollback = true;
                record.rci = fields.field(0).ok().and_then(|b| b.first().copied()).unwrap_or(0);
                record.kind = kind;
            }
            VectorKind::Commit => record.commit = true,
            VectorKind::RowInsert | VectorKind::RowDelete | VectorKind::RowUpdate | VectorKind::RowOverwrite => {
                apply_kdo(&mut record, &fields, vh.dba)?;
                record.kind = kind;
            }
            VectorKind::MultiRowInsert | VectorKind::MultiRowDelete => {
                apply_multi_row(&mut record, &fields)?;
                record.kind = kind;
            }
            VectorKind::Ddl => {
                record.ddl = Some(apply_ddl(&fields)?);
                record.kind = kind;
            }
            VectorKind::Supplemental => apply_supplemental(&mut record, &fields)?,
            VectorKind::Unknown(tag) => {
                if strict {
                    return Err(Error::CorruptLog(format!("unknown opcode {tag}")));
                }
                log::debug!("skipping unknown opcode {tag}");
            }
        }
        let _ = vh.scn_or_sequence;
        cursor = fields.end_offset();
    }

    Ok(record)
}

fn apply_ktb(record: &mut RedoLogRecord, fields: &FieldReader) -> CResult<()> {
    // field 0: xid (usn:u16, slt:u8, sqn:u32); field 1: uba; field 2:
    // flag byte (begin/commit/rollback, spec.md §4.4); field 3: itli;
    // fields 4+: undo column images, when this vector carries its own
    // before-image alongside the redo side (spec.md §4.4's "paired
    // immediately inside the record" update case).
    if let Ok(f) = fields.field(0) {
        if f.len() >= 7 {
            let usn = u16::from_le_bytes([f[0], f[1]]);
            let slt = f[2];
            let sqn = u32::from_le_bytes([f[3], f[4], f[5], f[6]]);
            record.xid = Xid::new(usn, slt, sqn);
        }
    }
    if let Ok(f) = fields.field(1) {
        if f.len() >= 7 {
            let block = u32::from_le_bytes([f[0], f[1], f[2], f[3]]);
            let sequence = u16::from_le_bytes([f[4], f[5]]);
            let rec = f[6];
            record.uba = Some(Uba { block, sequence, record: rec });
        }
    }
    if let Ok(f) = fields.field(2) {
        if let Some(&flag) = f.first() {
            record.begin = flag & 0x01 != 0;
            record.commit = record.commit || flag & 0x02 != 0;
            record.rollback = record.rollback || flag & 0x04 != 0;
        }
    }
    if let Ok(f) = fields.field(3) {
        record.itli = f.first().copied();
    }
    let mut undo_columns = Vec::new();
    for i in 4..fields.field_count() {
        if let Ok(bytes) = fields.field(i) {
            undo_columns.push(ColumnImage { seg_col_no: (i - 4) as i16, bytes: bytes.to_vec() });
        }
    }
    record.undo_columns = undo_columns;
    Ok(())
}

fn apply_kdo(record: &mut RedoLogRecord, fields: &FieldReader, dba_raw: u32) -> CResult<()> {
    // field 0: obj id; field 1: slot + flag byte; field 2: null bitmap;
    // remaining fields: one per changed column, tagged by seg_col_no
    // implicitly by position.
    if let Ok(f) = fields.field(0) {
        if f.len() >= 4 {
            record.obj = u32::from_le_bytes([f[0], f[1], f[2], f[3]]);
        }
    }
    record.dba = Dba { file_number: (dba_raw >> 22) as u16, block_number: dba_raw & 0x3F_FFFF };
    if let Ok(f) = fields.field(1) {
        if f.len() >= 3 {
            record.slot = u16::from_le_bytes([f[0], f[1]]);
            record.flags = RowFlags::from_byte(f[2]);
        }
    }
    let null_bitmap = fields.field(2).map(|f| f.iter().flat_map(|&b| (0..8).map(move |i| b & (1 << i) != 0)).collect()).unwrap_or_default();
    record.null_bitmap = null_bitmap;

    let mut columns = Vec::new();
    for i in 3..fields.field_count() {
        if let Ok(bytes) = fields.field(i) {
            columns.push(ColumnImage { seg_col_no: (i - 3) as i16, bytes: bytes.to_vec() });
        }
    }
    record.columns = columns;
    Ok(())
}

fn apply_multi_row(record: &mut RedoLogRecord, fields: &FieldReader) -> CResult<()> {
    // field 0: nrow; field 1: per-row slot array; remaining fields:
    // nrow groups of columns, grouped by a fixed stride (one field per
    // column per row, laid out row-major).
    let nrow = fields.field(0).ok().and_then(|f| f.first().copied()).unwrap_or(0) as usize;
    let slots: Vec<u16> = fields
        .field(1)
        .map(|f| f.chunks_exact(2).map(|c| u16::from_le_bytes([c[0], c[1]])).collect())
        .unwrap_or_default();

    let remaining = fields.field_count().saturating_sub(2);
    let cols_per_row = if nrow > 0 { remaining / nrow.max(1) } else { 0 };

    let mut rows = Vec::with_capacity(nrow);
    for r in 0..nrow {
        let mut columns = Vec::new();
        for c in 0..cols_per_row {
            let idx = 2 + r * cols_per_row + c;
            if let Ok(bytes) = fields.field(idx) {
                columns.push(ColumnImage { seg_col_no: c as i16, bytes: bytes.to_vec() });
            }
        }
        rows.push(MultiRowSlot { slot: slots.get(r).copied().unwrap_or(0), columns });
    }
    record.multi_row = rows;
    Ok(())
}

fn apply_ddl(fields: &FieldReader) -> CResult<DdlFields> {
    let obj = fields.field(0).ok().filter(|f| f.len() >= 4).map(|f| u32::from_le_bytes([f[0], f[1], f[2], f[3]])).unwrap_or(0);
    let kind_code = fields.field(1).ok().and_then(|f| f.first().copied()).unwrap_or(0) as u16;
    let owner = fields.field(2).map(|f| String::from_utf8_lossy(f).into_owned()).unwrap_or_default();
    let table = fields.field(3).map(|f| String::from_utf8_lossy(f).into_owned()).unwrap_or_default();
    let sql_text = fields.field(4).map(|f| String::from_utf8_lossy(f).into_owned()).unwrap_or_default();
    Ok(DdlFields { obj, kind: DdlKind::from_code(kind_code), owner, table, sql_text })
}

/// Appends a record's supplemental-log columns (spec.md §4.4: "list of
/// columns captured beyond what the physical change required"), read
/// from a trailing change vector tagged `(23, x)` by this engine's
/// convention, ahead of the assembler merging them into a full image.
pub fn apply_supplemental(record: &mut RedoLogRecord, fields: &FieldReader) -> CResult<()> {
    let mut cols = Vec::new();
    for i in 0..fields.field_count() {
        if let Ok(bytes) = fields.field(i) {
            cols.push(ColumnImage { seg_col_no: i as i16, bytes: bytes.to_vec() });
        }
    }
    record.supplemental = cols;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn push_field_table(buf: &mut Vec<u8>, fields: &[&[u8]]) {
        buf.extend_from_slice(&(fields.len() as u16).to_le_bytes());
        for f in fields {
            buf.extend_from_slice(&(f.len() as u16).to_le_bytes());
        }
        while buf.len() % 4 != 0 {
            buf.push(0);
        }
        for f in fields {
            buf.extend_from_slice(f);
            while buf.len() % 4 != 0 {
                buf.push(0);
            }
        }
    }

    fn record_header(length: u32, scn: u64, subscn: u16, seq: u8) -> Vec<u8> {
        let mut buf = vec![0u8; RECORD_HEADER_LEN];
        buf[0..4].copy_from_slice(&length.to_le_bytes());
        buf[4] = 0x80; // vld high bit -> scn64 form
        buf[5..13].copy_from_slice(&scn.to_le_bytes());
        buf[13..15].copy_from_slice(&subscn.to_le_bytes());
        buf[15] = seq;
        buf[16] = 1;
        buf
    }

    fn vector_header(major: u8, minor: u8, dba: u32, scn_or_seq: u64) -> Vec<u8> {
        let mut buf = vec![0u8; VECTOR_HEADER_LEN];
        buf[0] = major;
        buf[1] = minor;
        buf[2..4].copy_from_slice(&0u16.to_le_bytes());
        buf[4..8].copy_from_slice(&dba.to_le_bytes());
        buf[8..16].copy_from_slice(&scn_or_seq.to_le_bytes());
        buf
    }

    #[test]
    fn parses_insert_record_with_columns() {
        let mut buf = record_header(0, 0x11, 0, 1);
        buf.extend_from_slice(&vector_header(11, 2, 5 << 22 | 7, 0));
        push_field_table(&mut buf, &[&[0x11, 0x27, 0, 0], &[0, 0, 0b0000_0001], &[0, 0], b"AL"]);
        let rec = parse_record(&buf, ByteOrder::Little, false).unwrap();
        assert_eq!(rec.kind, VectorKind::RowInsert);
        assert_eq!(rec.obj, 0x2711);
        assert_eq!(rec.columns.len(), 2);
        assert_eq!(rec.columns[1].bytes, b"AL");
    }

    #[test]
    fn unknown_opcode_is_skipped_when_not_strict() {
        let mut buf = record_header(0, 1, 0, 1);
        buf.extend_from_slice(&vector_header(200, 1, 0, 0));
        push_field_table(&mut buf, &[&[1, 2, 3]]);
        let rec = parse_record(&buf, ByteOrder::Little, false).unwrap();
        assert!(matches!(rec.kind, VectorKind::Unknown(_)));
    }

    #[test]
    fn unknown_opcode_is_fatal_when_strict() {
        let mut buf = record_header(0, 1, 0, 1);
        buf.extend_from_slice(&vector_header(200, 1, 0, 0));
        push_field_table(&mut buf, &[&[1, 2, 3]]);
        assert!(parse_record(&buf, ByteOrder::Little, true).is_err());
    }

    #[test]
    fn ktb_vector_extracts_xid_and_uba() {
        let mut buf = record_header(0, 1, 0, 1);
        buf.extend_from_slice(&vector_header(5, 1, 0, 0));
        let xid_field = [1u8, 0, 2, 7, 0, 0, 0];
        let uba_field = [9u8, 0, 0, 0, 1, 0, 3];
        push_field_table(&mut buf, &[&xid_field, &uba_field]);
        let rec = parse_record(&buf, ByteOrder::Little, false).unwrap();
        assert_eq!(rec.xid, Xid::new(1, 2, 7));
        assert_eq!(rec.uba.unwrap().block, 9);
    }

    #[test]
    fn supplemental_vector_populates_record_without_overwriting_kind() {
        let mut buf = record_header(0, 0x11, 0, 1);
        buf.extend_from_slice(&vector_header(11, 5, 5 << 22 | 7, 0));
        push_field_table(&mut buf, &[&[0x11, 0x27, 0, 0], &[0, 0, 0b0000_0001], &[0, 0], b"BL"]);
        buf.extend_from_slice(&vector_header(23, 1, 0, 0));
        push_field_table(&mut buf, &[b"1"]);
        let rec = parse_record(&buf, ByteOrder::Little, false).unwrap();
        assert_eq!(rec.kind, VectorKind::RowUpdate);
        assert_eq!(rec.supplemental.len(), 1);
        assert_eq!(rec.supplemental[0].bytes, b"1");
    }
}
