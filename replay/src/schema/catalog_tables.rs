//! The ten dictionary-bootstrap row shapes, one per catalog table the
//! dictionary mirrors, per spec.md §4.3 ("ten row-id-keyed hash tables
//! mirroring the source database's own catalog tables"). Field sets are
//! trimmed to what §3/§4.3 need; grounded in
//! `original_source/src/common/table/*.h` (SysUser, SysObj, SysTab,
//! SysCol, SysCDef/SysCCol, SysTabPart/SysTabComPart/SysTabSubPart,
//! SysLob).
//!
//! These are the rows an external loader hands to
//! `SchemaDictionary::load_bootstrap_rows` (bulk load) or that the
//! system-table mutation tracker (§4.10) synthesizes from in-stream DDL.

use serde::{Deserialize, Serialize};

use crate::ids::{ObjId, RowId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SysUser {
    pub row_id: RowId,
    pub user_id: u32,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SysObj {
    pub row_id: RowId,
    pub owner_id: u32,
    pub obj: ObjId,
    pub data_obj: u32,
    pub name: String,
    /// Object type code (table, index, ...); only tables are tracked.
    pub obj_type: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SysTab {
    pub row_id: RowId,
    pub obj: ObjId,
    pub data_obj: u32,
    pub clu_cols: i16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SysCol {
    pub row_id: RowId,
    pub obj: ObjId,
    pub col_no: i16,
    pub seg_col_no: i16,
    pub name: String,
    pub type_no: u16,
    pub length: u32,
    pub precision: Option<i64>,
    pub scale: Option<i64>,
    pub charset_id: u32,
    pub nullable: bool,
}

/// `SYS.CDEF$`: constraint definitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SysCDef {
    pub row_id: RowId,
    pub con: u32,
    pub obj: ObjId,
    /// Constraint type code; only primary-key (`'P'`) constraints affect
    /// column PK ordinals.
    pub con_type: u8,
}

/// `SYS.CCOL$`: constraint columns, linking a `SysCDef` to the columns it
/// covers in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SysCCol {
    pub row_id: RowId,
    pub con: u32,
    pub col_no: i16,
    pub position: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SysTabPart {
    pub row_id: RowId,
    pub obj: ObjId,
    pub data_obj: u32,
    pub base_obj: ObjId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SysTabComPart {
    pub row_id: RowId,
    pub obj: ObjId,
    pub base_obj: ObjId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SysTabSubPart {
    pub row_id: RowId,
    pub obj: ObjId,
    pub data_obj: u32,
    pub pobj: ObjId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SysLob {
    pub row_id: RowId,
    pub obj: ObjId,
    pub col_no: i16,
    pub lob_obj: ObjId,
}

/// A row mutation as seen inside the redo stream, tagged with which
/// catalog table it targets. The system-table mutation tracker (§4.10)
/// builds a `SchemaDelta` out of these. Also the wire shape for a
/// dictionary bootstrap file handed to `load_bootstrap_rows`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CatalogRow {
    User(SysUser),
    Obj(SysObj),
    Tab(SysTab),
    Col(SysCol),
    CDef(SysCDef),
    CCol(SysCCol),
    TabPart(SysTabPart),
    TabComPart(SysTabComPart),
    TabSubPart(SysTabSubPart),
    Lob(SysLob),
}

/// How a catalog row was applied: insert, update or delete of the
/// underlying dictionary entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogOp {
    Insert,
    Update,
    Delete,
}

/// Which of the ten catalog tables a physical object id maps to. The
/// mapping itself (`obj_id -> CatalogTableKind`) is supplied by the same
/// external loader that bootstraps the dictionary, mirroring spec.md
/// §1's "core consumes already-parsed dictionary rows" boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CatalogTableKind {
    User,
    Obj,
    Tab,
    Col,
    CDef,
    CCol,
    TabPart,
    TabComPart,
    TabSubPart,
    Lob,
}
