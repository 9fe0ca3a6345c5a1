//! 24.1 DDL change vector fields (spec.md §4.4): passed through as opaque
//! text plus an object identifier, per spec.md §1's non-goal of SQL
//! parsing DDL.

use crate::ids::ObjId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DdlKind {
    Truncate,
    Drop,
    Alter,
    Create,
    Rename,
    Other(u16),
}

impl DdlKind {
    pub fn from_code(code: u16) -> DdlKind {
        match code {
            1 => DdlKind::Create,
            2 => DdlKind::Alter,
            3 => DdlKind::Drop,
            4 => DdlKind::Truncate,
            5 => DdlKind::Rename,
            other => DdlKind::Other(other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DdlFields {
    pub obj: ObjId,
    pub kind: DdlKind,
    pub owner: String,
    pub table: String,
    pub sql_text: String,
}
