//! In-memory schema dictionary (spec.md §4.3): a catalog built from ten
//! row-id-keyed hash tables mirroring the source database's own catalog
//! tables, with derived indexes (object->columns, object->PK ordinals)
//! rebuilt whenever the dictionary is mutated.
//!
//! Snapshots are immutable once published (§5's concurrency model: "a
//! single atomic pointer swap makes a new snapshot current"); we model
//! the atomic swap with an `Arc` published from the single reader thread
//! that owns the dictionary, cloned cheaply by anything that needs to
//! decode against a point-in-time view.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::CResult;
use crate::ids::{ObjId, RowId};
use crate::primitives::Scn;
use crate::schema::catalog_tables::{
    CatalogOp, CatalogRow, CatalogTableKind, SysCCol, SysCDef, SysCol, SysLob, SysObj, SysTab,
    SysTabComPart, SysTabPart, SysTabSubPart, SysUser,
};
use crate::schema::column::{ColumnType, SchemaColumn};
use crate::schema::object::SchemaObject;

/// An immutable, cheaply clonable view of the dictionary effective as of
/// some commit SCN.
#[derive(Debug, Clone)]
pub struct Schema {
    pub effective_scn: Scn,
    objects_by_data_obj: Arc<HashMap<u32, Arc<SchemaObject>>>,
}

impl Schema {
    fn empty(scn: Scn) -> Schema {
        Schema { effective_scn: scn, objects_by_data_obj: Arc::new(HashMap::new()) }
    }

    /// `find_table(obj_id) -> Option<&Table>`, O(1) expected.
    pub fn find_table(&self, data_obj: u32) -> Option<&Arc<SchemaObject>> {
        self.objects_by_data_obj.get(&data_obj)
    }

    pub fn find_column(&self, data_obj: u32, seg_col_no: i16) -> Option<&SchemaColumn> {
        self.find_table(data_obj)?.column_by_seg_pos(seg_col_no)
    }
}

#[derive(Default)]
struct RawTables {
    users: HashMap<RowId, SysUser>,
    objs: HashMap<RowId, SysObj>,
    tabs: HashMap<RowId, SysTab>,
    cols: HashMap<RowId, SysCol>,
    cdefs: HashMap<RowId, SysCDef>,
    ccols: HashMap<RowId, SysCCol>,
    tab_parts: HashMap<RowId, SysTabPart>,
    tab_com_parts: HashMap<RowId, SysTabComPart>,
    tab_sub_parts: HashMap<RowId, SysTabSubPart>,
    lobs: HashMap<RowId, SysLob>,
}

pub struct SchemaDictionary {
    raw: RawTables,
    current: Arc<Schema>,
    history: Vec<Arc<Schema>>,
    keep_old_versions: bool,
    /// Which physical object ids are themselves catalog tables, so the
    /// system-table mutation tracker (§4.10) knows to intercept changes
    /// to them. Populated by the same external loader that supplies
    /// bootstrap rows.
    catalog_object_kinds: HashMap<ObjId, CatalogTableKind>,
}

impl SchemaDictionary {
    pub fn new(keep_old_versions: bool) -> Self {
        SchemaDictionary {
            raw: RawTables::default(),
            current: Arc::new(Schema::empty(Scn::NONE)),
            history: Vec::new(),
            keep_old_versions,
            catalog_object_kinds: HashMap::new(),
        }
    }

    pub fn register_catalog_objects(&mut self, kinds: HashMap<ObjId, CatalogTableKind>) {
        self.catalog_object_kinds.extend(kinds);
    }

    pub fn catalog_kind_of(&self, obj: ObjId) -> Option<CatalogTableKind> {
        self.catalog_object_kinds.get(&obj).copied()
    }

    /// Bulk load at bootstrap. Rows may arrive in any order; callers
    /// trigger exactly one `rebuild_indexes` pass afterward.
    pub fn load_bootstrap_rows(&mut self, rows: Vec<CatalogRow>) -> CResult<()> {
        for row in rows {
            self.insert_raw(row);
        }
        self.rebuild_indexes(None, Scn::NONE);
        Ok(())
    }

    /// Mutates one underlying catalog table. Called by the system-table
    /// mutation tracker on commit only (§4.10); does not itself rebuild
    /// derived indexes -- the caller does that once per commit for the
    /// affected object ids.
    pub fn apply_dictionary_change(&mut self, op: CatalogOp, row: CatalogRow) -> CResult<()> {
        match op {
            CatalogOp::Insert | CatalogOp::Update => self.insert_raw(row),
            CatalogOp::Delete => self.remove_raw(row),
        }
        Ok(())
    }

    fn insert_raw(&mut self, row: CatalogRow) {
        match row {
            CatalogRow::User(r) => { self.raw.users.insert(r.row_id, r); }
            CatalogRow::Obj(r) => { self.raw.objs.insert(r.row_id, r); }
            CatalogRow::Tab(r) => { self.raw.tabs.insert(r.row_id, r); }
            CatalogRow::Col(r) => { self.raw.cols.insert(r.row_id, r); }
            CatalogRow::CDef(r) => { self.raw.cdefs.insert(r.row_id, r); }
            CatalogRow::CCol(r) => { self.raw.ccols.insert(r.row_id, r); }
            CatalogRow::TabPart(r) => { self.raw.tab_parts.insert(r.row_id, r); }
            CatalogRow::TabComPart(r) => { self.raw.tab_com_parts.insert(r.row_id, r); }
            CatalogRow::TabSubPart(r) => { self.raw.tab_sub_parts.insert(r.row_id, r); }
            CatalogRow::Lob(r) => { self.raw.lobs.insert(r.row_id, r); }
        }
    }

    fn remove_raw(&mut self, row: CatalogRow) {
        match row {
            CatalogRow::User(r) => { self.raw.users.remove(&r.row_id); }
            CatalogRow::Obj(r) => { self.raw.objs.remove(&r.row_id); }
            CatalogRow::Tab(r) => { self.raw.tabs.remove(&r.row_id); }
            CatalogRow::Col(r) => { self.raw.cols.remove(&r.row_id); }
            CatalogRow::CDef(r) => { self.raw.cdefs.remove(&r.row_id); }
            CatalogRow::CCol(r) => { self.raw.ccols.remove(&r.row_id); }
            CatalogRow::TabPart(r) => { self.raw.tab_parts.remove(&r.row_id); }
            CatalogRow::TabComPart(r) => { self.raw.tab_com_parts.remove(&r.row_id); }
            CatalogRow::TabSubPart(r) => { self.raw.tab_sub_parts.remove(&r.row_id); }
            CatalogRow::Lob(r) => { self.raw.lobs.remove(&r.row_id); }
        }
    }

    /// Rebuilds the object->columns and object->PK-ordinal derived
    /// indexes from the canonical tables, then publishes a new
    /// snapshot effective at `scn`. `affected` is advisory only (a full
    /// recompute is cheap at the scale this dictionary targets); `None`
    /// rebuilds everything, matching the bootstrap path.
    pub fn rebuild_indexes(&mut self, affected: Option<&[ObjId]>, scn: Scn) {
        let _ = affected; // full rebuild; see doc comment
        let mut objects_by_data_obj: HashMap<u32, Arc<SchemaObject>> = HashMap::new();

        // 1. base tables: one SchemaObject per SysObj that has a SysTab row.
        let mut base_by_obj: HashMap<ObjId, SchemaObject> = HashMap::new();
        for obj in self.raw.objs.values() {
            if !self.raw.tabs.values().any(|t| t.obj == obj.obj) {
                continue;
            }
            let owner = self
                .raw
                .users
                .values()
                .find(|u| u.user_id == obj.owner_id)
                .map(|u| u.name.clone())
                .unwrap_or_default();

            let columns = self.columns_for(obj.obj);

            base_by_obj.insert(
                obj.obj,
                SchemaObject {
                    obj: obj.obj,
                    data_obj: obj.data_obj,
                    owner,
                    name: obj.name.clone(),
                    columns,
                    base_obj: None,
                },
            );
        }

        for schema_obj in base_by_obj.values() {
            objects_by_data_obj.insert(schema_obj.data_obj, Arc::new(schema_obj.clone()));
        }

        // 2. partitions: clone the base table's logical shape under the
        // partition's own physical data_obj.
        for part in self.raw.tab_parts.values() {
            if let Some(base) = base_by_obj.get(&part.base_obj) {
                let mut clone = base.clone();
                clone.obj = part.obj;
                clone.data_obj = part.data_obj;
                clone.base_obj = Some(part.base_obj);
                objects_by_data_obj.insert(part.data_obj, Arc::new(clone));
            }
        }
        for part in self.raw.tab_sub_parts.values() {
            if let Some(base) = base_by_obj.get(&part.pobj) {
                let mut clone = base.clone();
                clone.obj = part.obj;
                clone.data_obj = part.data_obj;
                clone.base_obj = Some(part.pobj);
                objects_by_data_obj.insert(part.data_obj, Arc::new(clone));
            }
        }

        let schema = Arc::new(Schema { effective_scn: scn, objects_by_data_obj: Arc::new(objects_by_data_obj) });

        if self.keep_old_versions {
            self.history.push(self.current.clone());
        }
        self.current = schema;
    }

    fn columns_for(&self, obj: ObjId) -> Vec<SchemaColumn> {
        let pk_ordinals = self.pk_ordinals_for(obj);

        let mut cols: Vec<SchemaColumn> = self
            .raw
            .cols
            .values()
            .filter(|c| c.obj == obj)
            .map(|c| SchemaColumn {
                col_no: c.col_no,
                seg_col_no: c.seg_col_no,
                name: c.name.clone(),
                col_type: ColumnType::from_code(c.type_no),
                length: c.length,
                precision: c.precision,
                scale: c.scale,
                pk_ordinal: pk_ordinals.get(&c.col_no).copied(),
                charset_id: c.charset_id,
                nullable: c.nullable,
                supplemental_log: pk_ordinals.contains_key(&c.col_no),
            })
            .collect();
        cols.sort_by_key(|c| c.seg_col_no);
        cols
    }

    fn pk_ordinals_for(&self, obj: ObjId) -> HashMap<i16, u16> {
        let mut out = HashMap::new();
        let pk_con = self.raw.cdefs.values().find(|c| c.obj == obj && c.con_type == b'P');
        if let Some(con) = pk_con {
            let mut members: Vec<&SysCCol> = self.raw.ccols.values().filter(|cc| cc.con == con.con).collect();
            members.sort_by_key(|cc| cc.position);
            for (i, cc) in members.iter().enumerate() {
                out.insert(cc.col_no, (i + 1) as u16);
            }
        }
        out
    }

    /// `snapshot_at(scn) -> Arc<Schema>`: the version effective at or
    /// before `scn`. Without `keep_old_versions`, only the current
    /// snapshot is available, matching `flags.schema-keep`'s default-off
    /// behavior in spec.md §6.
    pub fn snapshot_at(&self, scn: Scn) -> Arc<Schema> {
        if !self.keep_old_versions {
            return self.current.clone();
        }
        self.history
            .iter()
            .rev()
            .find(|s| s.effective_scn <= scn)
            .cloned()
            .unwrap_or_else(|| self.current.clone())
    }

    pub fn current(&self) -> Arc<Schema> {
        self.current.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::Dba;

    fn row_id(n: u32) -> RowId {
        RowId { data_obj: n, dba: Dba { file_number: 1, block_number: n }, slot: 0 }
    }

    #[test]
    fn bootstrap_then_find_table_by_data_obj() {
        let mut dict = SchemaDictionary::new(false);
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
                seg_col_no: 1,
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
                seg_col_no: 2,
                name: "NAME".into(),
                type_no: 1,
                length: 20,
                precision: None,
                scale: None,
                charset_id: 1,
                nullable: true,
            }),
        ];
        dict.load_bootstrap_rows(rows).unwrap();

        let schema = dict.snapshot_at(Scn(1));
        let table = schema.find_table(10001).expect("table present");
        assert_eq!(table.owner, "HR");
        assert_eq!(table.name, "EMP");
        assert_eq!(table.columns.len(), 2);
        assert_eq!(table.columns[0].name, "ID");
    }

    #[test]
    fn partition_inherits_base_table_columns() {
        let mut dict = SchemaDictionary::new(false);
        let rows = vec![
            CatalogRow::User(SysUser { row_id: row_id(1), user_id: 7, name: "HR".into() }),
            CatalogRow::Obj(SysObj {
                row_id: row_id(2),
                owner_id: 7,
                obj: 200,
                data_obj: 200,
                name: "SALES".into(),
                obj_type: 2,
            }),
            CatalogRow::Tab(SysTab { row_id: row_id(3), obj: 200, data_obj: 200, clu_cols: 0 }),
            CatalogRow::Col(SysCol {
                row_id: row_id(4),
                obj: 200,
                col_no: 1,
                seg_col_no: 1,
                name: "AMT".into(),
                type_no: 2,
                length: 22,
                precision: None,
                scale: None,
                charset_id: 0,
                nullable: true,
            }),
            CatalogRow::TabPart(SysTabPart { row_id: row_id(5), obj: 201, data_obj: 501, base_obj: 200 }),
        ];
        dict.load_bootstrap_rows(rows).unwrap();
        let schema = dict.snapshot_at(Scn(1));
        let part = schema.find_table(501).expect("partition present");
        assert_eq!(part.name, "SALES");
        assert_eq!(part.base_obj, Some(200));
        assert_eq!(part.columns.len(), 1);
    }

    #[test]
    fn primary_key_ordinals_come_from_cdef_ccol() {
        let mut dict = SchemaDictionary::new(false);
        let rows = vec![
            CatalogRow::User(SysUser { row_id: row_id(1), user_id: 1, name: "HR".into() }),
            CatalogRow::Obj(SysObj { row_id: row_id(2), owner_id: 1, obj: 10, data_obj: 10, name: "T".into(), obj_type: 2 }),
            CatalogRow::Tab(SysTab { row_id: row_id(3), obj: 10, data_obj: 10, clu_cols: 0 }),
            CatalogRow::Col(SysCol { row_id: row_id(4), obj: 10, col_no: 1, seg_col_no: 1, name: "ID".into(), type_no: 2, length: 22, precision: None, scale: None, charset_id: 0, nullable: false }),
            CatalogRow::CDef(SysCDef { row_id: row_id(5), con: 99, obj: 10, con_type: b'P' }),
            CatalogRow::CCol(SysCCol { row_id: row_id(6), con: 99, col_no: 1, position: 1 }),
        ];
        dict.load_bootstrap_rows(rows).unwrap();
        let schema = dict.snapshot_at(Scn(1));
        let table = schema.find_table(10).unwrap();
        assert_eq!(table.columns[0].pk_ordinal, Some(1));
    }
}
