//! Schema dictionary (spec.md §4.3): decodes physical object ids and raw
//! column bytes into logical table/column/value shapes.

pub mod catalog_tables;
pub mod column;
pub mod dictionary;
pub mod object;
pub mod types;

pub use catalog_tables::{
    CatalogOp, CatalogRow, CatalogTableKind, SysCCol, SysCDef, SysCol, SysLob, SysObj, SysTab,
    SysTabComPart, SysTabPart, SysTabSubPart, SysUser,
};
pub use column::{ColumnType, SchemaColumn};
pub use dictionary::{Schema, SchemaDictionary};
pub use object::SchemaObject;
pub use types::{decode_column, ColumnValue};
