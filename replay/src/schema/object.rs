//! A table or partition, as decoded from the dictionary's catalog rows.

use serde::{Deserialize, Serialize};

use crate::ids::ObjId;
use crate::schema::column::SchemaColumn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaObject {
    pub obj: ObjId,
    /// Physical object id for this segment; for a partitioned table
    /// several `SchemaObject`s (one per partition) share the same `obj`
    /// but have distinct `data_obj` values.
    pub data_obj: u32,
    pub owner: String,
    pub name: String,
    /// Columns ordered by segment position (`seg_col_no`), rebuilt
    /// whenever the dictionary is mutated.
    pub columns: Vec<SchemaColumn>,
    /// Non-partitioned base table obj id if this object is a partition,
    /// else `None`.
    pub base_obj: Option<ObjId>,
}

impl SchemaObject {
    pub fn column_by_seg_pos(&self, seg_col_no: i16) -> Option<&SchemaColumn> {
        self.columns.iter().find(|c| c.seg_col_no == seg_col_no)
    }

    pub fn primary_key_columns(&self) -> Vec<&SchemaColumn> {
        let mut pk: Vec<&SchemaColumn> = self.columns.iter().filter(|c| c.pk_ordinal.is_some()).collect();
        pk.sort_by_key(|c| c.pk_ordinal.unwrap());
        pk
    }
}
