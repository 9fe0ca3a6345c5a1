//! Bounds-checked reader over a change vector's field table (spec.md §6:
//! "a field table at offset 24: u16 field count followed by that many u16
//! field lengths"). Replaces raw pointer arithmetic over redo bytes with
//! offset+length validation, per the REDESIGN FLAGS note on wrapping the
//! raw slice in a bounds-checked reader type.

use crate::error::{CResult, Error};
use crate::primitives::{align4, read_u16, ByteOrder};

/// A parsed field table: each entry's `(offset, length)` into the
/// change vector's byte slice, already resolved with the `(len+3)&~3`
/// alignment rule applied between fields.
pub struct FieldReader<'a> {
    buf: &'a [u8],
    entries: Vec<(usize, u16)>,
    end_offset: usize,
}

impl<'a> FieldReader<'a> {
    /// `table_offset` is where the `u16` field count begins.
    pub fn parse(buf: &'a [u8], table_offset: usize, order: ByteOrder) -> CResult<FieldReader<'a>> {
        let count = read_u16(buf, table_offset, order)? as usize;
        let lengths_start = table_offset + 2;
        let mut entries = Vec::with_capacity(count);
        let mut cursor = lengths_start + count * 2;
        // round the start of the payload region up to the alignment rule
        cursor = (cursor + 3) & !3;
        for i in 0..count {
            let len = read_u16(buf, lengths_start + i * 2, order)?;
            entries.push((cursor, len));
            cursor += align4(len) as usize;
        }
        Ok(FieldReader { buf, entries, end_offset: cursor })
    }

    /// Offset of the first byte after this field table's last payload,
    /// already aligned -- where the next change vector header begins.
    pub fn end_offset(&self) -> usize {
        self.end_offset
    }

    pub fn field_count(&self) -> usize {
        self.entries.len()
    }

    /// Returns the raw bytes for field `index`, or `FieldTooShort` if the
    /// declared length overruns the buffer.
    pub fn field(&self, index: usize) -> CResult<&'a [u8]> {
        let (offset, len) = *self
            .entries
            .get(index)
            .ok_or_else(|| Error::CorruptLog(format!("field {index} not present")))?;
        self.buf.get(offset..offset + len as usize).ok_or_else(|| {
            Error::CorruptLog(format!(
                "field {index} too short: offset={offset} len={len} buf_len={}",
                self.buf.len()
            ))
        })
    }

    pub fn field_len(&self, index: usize) -> Option<u16> {
        self.entries.get(index).map(|(_, len)| *len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(fields: &[&[u8]]) -> Vec<u8> {
        let mut buf = Vec::new();
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
        buf
    }

    #[test]
    fn reads_fields_with_alignment() {
        let buf = build(&[&[1, 2, 3], &[9, 9]]);
        let fr = FieldReader::parse(&buf, 0, ByteOrder::Little).unwrap();
        assert_eq!(fr.field_count(), 2);
        assert_eq!(fr.field(0).unwrap(), &[1, 2, 3]);
        assert_eq!(fr.field(1).unwrap(), &[9, 9]);
    }

    #[test]
    fn missing_field_is_corrupt_log() {
        let buf = build(&[&[1]]);
        let fr = FieldReader::parse(&buf, 0, ByteOrder::Little).unwrap();
        assert!(fr.field(5).is_err());
    }
}
