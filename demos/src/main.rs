//! Builds one synthetic redo record by hand -- a single `HR.EMP` insert,
//! begin and commit folded into the same record, the way an autonomous
//! single-row transaction is logged -- and drives it through the parser,
//! transaction buffer and assembler without a log file or a CLI around
//! it, the way the teacher's own `example` crate calls straight into
//! `LogCask` with no server in front of it.

use std::collections::HashMap;

use redo_replay::assembler::Assembler;
use redo_replay::config::ReplayConfig;
use redo_replay::ids::{Dba, RowId};
use redo_replay::output::OutputBuffer;
use redo_replay::primitives::ByteOrder;
use redo_replay::record::{parse_record, RECORD_HEADER_LEN, VECTOR_HEADER_LEN};
use redo_replay::schema::{CatalogRow, CatalogTableKind, SchemaDictionary, SysCol, SysObj, SysTab, SysUser};
use redo_replay::system_tracker::SystemTableMutationTracker;
use redo_replay::txn::{RecordPair, TransactionBuffer};

fn main() {
    println!("Hello, redo-replay!");

    run().expect("demo replay failed");

    println!("Bye~");
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let dictionary = bootstrap_dictionary();
    let record_bytes = build_insert_record();

    let record = parse_record(&record_bytes, ByteOrder::Little, true)?;
    assert!(record.begin);
    assert!(record.commit);

    let xid = record.xid;
    let commit_scn = record.scn;

    let mut buffer = TransactionBuffer::new(1);
    buffer.begin(xid, 1, commit_scn);
    buffer.append(xid, 1, commit_scn, RecordPair { undo: Some(record.clone()), redo: Some(record) })?;

    let mut dictionary = dictionary;
    let mut tracker = SystemTableMutationTracker::new();
    let config = ReplayConfig::default();
    let output = OutputBuffer::new(1);

    let mut assembler = Assembler {
        buffer: &mut buffer,
        dictionary: &mut dictionary,
        tracker: &mut tracker,
        output: output.clone(),
        config: &config,
    };
    assembler.commit(xid, commit_scn)?;
    output.shutdown();

    while let Some(message) = output.next() {
        let pretty: serde_json::Value = serde_json::from_slice(&message.bytes)?;
        println!("{}", serde_json::to_string_pretty(&pretty)?);
    }

    Ok(())
}

/// `HR.EMP(ID NUMBER, NAME VARCHAR2(20))`, object 10001. `seg_col_no` is
/// 0-based here to match `record::apply_kdo`'s column numbering.
fn bootstrap_dictionary() -> SchemaDictionary {
    let mut dictionary = SchemaDictionary::new(false);

    let mut kinds = HashMap::new();
    kinds.insert(10001, CatalogTableKind::Obj);
    dictionary.register_catalog_objects(kinds);

    let row_id = |n: u32| RowId { data_obj: 10001, dba: Dba { file_number: 1, block_number: n }, slot: 0 };

    let rows = vec![
        CatalogRow::User(SysUser { row_id: row_id(1), user_id: 7, name: "HR".into() }),
        CatalogRow::Obj(SysObj {
            row_id: row_id(2),
            owner_id: 7,
            obj: 10001,
            data_obj: 10001,
            name: "EMP".into(),
            obj_type: 2,
        }),
        CatalogRow::Tab(SysTab { row_id: row_id(3), obj: 10001, data_obj: 10001, clu_cols: 0 }),
        CatalogRow::Col(SysCol {
            row_id: row_id(4),
            obj: 10001,
            col_no: 1,
            seg_col_no: 0,
            name: "ID".into(),
            type_no: 2,
            length: 22,
            precision: None,
            scale: None,
            charset_id: 0,
            nullable: false,
        }),
        CatalogRow::Col(SysCol {
            row_id: row_id(5),
            obj: 10001,
            col_no: 2,
            seg_col_no: 1,
            name: "NAME".into(),
            type_no: 1,
            length: 20,
            precision: None,
            scale: None,
            charset_id: 1,
            nullable: true,
        }),
    ];
    dictionary.load_bootstrap_rows(rows).expect("bootstrap rows are well-formed");
    dictionary
}

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

fn record_header(scn: u64, subscn: u16, seq: u8) -> Vec<u8> {
    let mut buf = vec![0u8; RECORD_HEADER_LEN];
    buf[4] = 0x80; // vld high bit -> 8-byte scn form
    buf[5..13].copy_from_slice(&scn.to_le_bytes());
    buf[13..15].copy_from_slice(&subscn.to_le_bytes());
    buf[15] = seq;
    buf[16] = 1;
    buf
}

fn vector_header(major: u8, minor: u8, dba: u32) -> Vec<u8> {
    let mut buf = vec![0u8; VECTOR_HEADER_LEN];
    buf[0] = major;
    buf[1] = minor;
    buf[4..8].copy_from_slice(&dba.to_le_bytes());
    buf
}

/// One physical record carrying both the KTB vector (begin+commit folded
/// into its flag byte, the way a single-statement autonomous transaction
/// is logged) and the row-insert vector for `HR.EMP(1, 'ADA')`.
fn build_insert_record() -> Vec<u8> {
    let mut buf = record_header(0x100, 0, 1);

    // 5.1 KTB: xid, uba, flags (begin=0x01 | commit=0x02), itli.
    buf.extend_from_slice(&vector_header(5, 1, 0));
    let xid_field = [1u8, 0, 2, 7, 0, 0, 0]; // usn=1, slt=2, sqn=7
    let uba_field = [0u8, 0, 0, 0, 0, 0, 0];
    let flags_field = [0x03u8];
    let itli_field = [1u8];
    push_field_table(&mut buf, &[&xid_field, &uba_field, &flags_field, &itli_field]);

    // 11.2 row insert: obj id, slot+flags, null bitmap, ID, NAME.
    let dba = (1u32 << 22) | 500; // file 1, block 500
    buf.extend_from_slice(&vector_header(11, 2, dba));
    let obj_field = 10001u32.to_le_bytes();
    let slot_field = [0u8, 0, 0x03]; // slot 0, head+last row piece
    let null_bitmap = [0b0000_0000u8];
    let id_field = [0xC1u8, 0x02]; // NUMBER encoding of 1
    let name_field = b"ADA";
    push_field_table(&mut buf, &[&obj_field, &slot_field, &null_bitmap, &id_field, name_field]);

    buf
}
