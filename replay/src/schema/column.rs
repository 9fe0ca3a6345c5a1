//! Column and type metadata, grounded in
//! `original_source/src/OracleColumn.h`'s field set, trimmed to what
//! spec.md §4.3's type-interpretation rules need.

use serde::{Deserialize, Serialize};

/// Physical column type codes this engine knows how to decode, per
/// spec.md §4.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    /// Type 1/96: VARCHAR2/CHAR.
    Varchar,
    /// Type 2: NUMBER.
    Number,
    /// Type 12/180: DATE/TIMESTAMP.
    Date,
    /// Type 23: RAW.
    Raw,
    /// Type 100/101: binary float/double.
    BinaryFloat,
    BinaryDouble,
    /// Any other on-disk type code: passed through as hex-encoded bytes.
    Other(u16),
}

impl ColumnType {
    pub fn from_code(code: u16) -> ColumnType {
        match code {
            1 | 96 => ColumnType::Varchar,
            2 => ColumnType::Number,
            12 | 180 => ColumnType::Date,
            23 => ColumnType::Raw,
            100 => ColumnType::BinaryFloat,
            101 => ColumnType::BinaryDouble,
            other => ColumnType::Other(other),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaColumn {
    /// 1-based ordinal position within the table's column list.
    pub col_no: i16,
    /// Position within the physical segment (may differ from `col_no`
    /// after `ADD`/`DROP COLUMN` churn).
    pub seg_col_no: i16,
    pub name: String,
    pub col_type: ColumnType,
    pub length: u32,
    pub precision: Option<i64>,
    pub scale: Option<i64>,
    /// 1-based ordinal within the primary key, or `None` if not a PK
    /// column.
    pub pk_ordinal: Option<u16>,
    pub charset_id: u32,
    pub nullable: bool,
    /// Whether this column is captured by supplemental logging policy
    /// even when its value is physically unchanged.
    pub supplemental_log: bool,
}
