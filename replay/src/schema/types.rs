//! Column value decode rules (spec.md §4.3's type-interpretation table).
//! Each function takes the raw on-disk bytes for one column value and
//! returns a `ColumnValue` the assembler can serialize into an output
//! event. Grounded in `original_source/src/common/table/SysCol.h`'s type
//! codes and the classic Oracle NUMBER/DATE internal representations.

use serde::{Deserialize, Serialize};

use crate::error::{CResult, Error};
use crate::primitives::ByteOrder;
use crate::schema::column::ColumnType;

/// A decoded column value, already in a JSON-representable shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnValue {
    Null,
    Text(String),
    Number(String),
    Timestamp(String),
    Bytes(String),
    Float(f32),
    Double(f64),
}

/// Decodes `bytes` as `col_type`. Returns `Error::CorruptLog` if the
/// byte length doesn't match what the type requires.
pub fn decode_column(col_type: ColumnType, bytes: &[u8]) -> CResult<ColumnValue> {
    if bytes.is_empty() {
        return Ok(ColumnValue::Null);
    }
    match col_type {
        ColumnType::Varchar => Ok(ColumnValue::Text(String::from_utf8_lossy(bytes).into_owned())),
        ColumnType::Number => decode_number(bytes).map(ColumnValue::Number),
        ColumnType::Date => decode_date(bytes).map(ColumnValue::Timestamp),
        ColumnType::Raw => Ok(ColumnValue::Bytes(hex::encode(bytes))),
        ColumnType::BinaryFloat => decode_binary_float(bytes).map(ColumnValue::Float),
        ColumnType::BinaryDouble => decode_binary_double(bytes).map(ColumnValue::Double),
        ColumnType::Other(_) => Ok(ColumnValue::Bytes(hex::encode(bytes))),
    }
}

/// NUMBER: an exponent byte followed by 1-20 base-100 "digit" bytes. The
/// exponent byte's top bit marks sign (set = positive); the low 7 bits
/// hold the digit-group count biased by `0xC0`/`0x3F` for positive/negative.
/// Positive digit bytes are biased by 1; negative ones are stored as
/// `101 - digit` with an optional trailing `0x66` terminator. The first
/// digit group of the integer part is rendered without a leading zero,
/// so values under 10 decode to one digit rather than two.
pub fn decode_number(bytes: &[u8]) -> CResult<String> {
    if bytes.is_empty() {
        return Err(Error::CorruptLog("number needs at least 1 byte".to_string()));
    }
    if bytes.len() == 1 && bytes[0] == 0x80 {
        return Ok("0".to_string());
    }
    let exp_byte = bytes[0];
    let negative = exp_byte <= 0x3F;

    let mut mantissa = &bytes[1..];
    if negative && mantissa.last() == Some(&0x66) {
        mantissa = &mantissa[..mantissa.len() - 1];
    }

    let int_groups: usize = if negative {
        (0x3F - exp_byte) as usize
    } else if exp_byte >= 0xC0 {
        (exp_byte - 0xC0) as usize
    } else {
        return Err(Error::CorruptLog(format!("invalid number exponent byte: {exp_byte:#x}")));
    };

    let digit_value = |raw: u8| -> CResult<i32> {
        let v = if negative { 101 - raw as i32 } else { raw as i32 - 1 };
        if !(0..=99).contains(&v) {
            return Err(Error::CorruptLog(format!("number digit out of range: {v}")));
        }
        Ok(v)
    };
    let push_pair = |s: &mut String, v: i32| {
        s.push((b'0' + (v / 10) as u8) as char);
        s.push((b'0' + (v % 10) as u8) as char);
    };

    let mut s = String::new();
    if negative {
        s.push('-');
    }

    let mut idx = 0usize;
    if int_groups == 0 {
        s.push('0');
    } else {
        if mantissa.is_empty() {
            return Err(Error::CorruptLog("number has no digit bytes".to_string()));
        }
        let first = digit_value(mantissa[0])?;
        if first < 10 {
            s.push((b'0' + first as u8) as char);
        } else {
            push_pair(&mut s, first);
        }
        idx = 1;
        for _ in 1..int_groups {
            if idx < mantissa.len() {
                let v = digit_value(mantissa[idx])?;
                push_pair(&mut s, v);
                idx += 1;
            } else {
                s.push_str("00");
            }
        }
    }

    if idx < mantissa.len() {
        s.push('.');
        while idx + 1 < mantissa.len() {
            let v = digit_value(mantissa[idx])?;
            push_pair(&mut s, v);
            idx += 1;
        }
        let last = digit_value(mantissa[idx])?;
        s.push((b'0' + (last / 10) as u8) as char);
        if last % 10 != 0 {
            s.push((b'0' + (last % 10) as u8) as char);
        }
    }

    Ok(s)
}

/// DATE/TIMESTAMP: 7 fixed bytes, `century+100, year+100, month, day,
/// hour+1, minute+1, second+1`.
pub fn decode_date(bytes: &[u8]) -> CResult<String> {
    if bytes.len() < 7 {
        return Err(Error::CorruptLog(format!("date needs 7 bytes, got {}", bytes.len())));
    }
    let century = bytes[0] as i32 - 100;
    let year_in_century = bytes[1] as i32 - 100;
    let year = century * 100 + year_in_century;
    let month = bytes[2];
    let day = bytes[3];
    let hour = bytes[4] as i32 - 1;
    let minute = bytes[5] as i32 - 1;
    let second = bytes[6] as i32 - 1;
    Ok(format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}",
        year, month, day, hour, minute, second
    ))
}

/// Binary float: IEEE 754 single precision with the sign/exponent byte
/// pattern flipped on-disk (high bit set for positive numbers, all bits
/// flipped for negative ones) to preserve byte-order comparability.
pub fn decode_binary_float(bytes: &[u8]) -> CResult<f32> {
    if bytes.len() != 4 {
        return Err(Error::CorruptLog(format!("binary float needs 4 bytes, got {}", bytes.len())));
    }
    let mut b = [bytes[0], bytes[1], bytes[2], bytes[3]];
    if b[0] & 0x80 != 0 {
        b[0] &= 0x7F;
    } else {
        for x in b.iter_mut() {
            *x = !*x;
        }
    }
    Ok(f32::from_be_bytes(b))
}

pub fn decode_binary_double(bytes: &[u8]) -> CResult<f64> {
    if bytes.len() != 8 {
        return Err(Error::CorruptLog(format!("binary double needs 8 bytes, got {}", bytes.len())));
    }
    let mut b = [0u8; 8];
    b.copy_from_slice(bytes);
    if b[0] & 0x80 != 0 {
        b[0] &= 0x7F;
    } else {
        for x in b.iter_mut() {
            *x = !*x;
        }
    }
    Ok(f64::from_be_bytes(b))
}

/// Reads a column's raw bytes out of a field table entry, honoring the
/// engine-wide 4-byte alignment rule. `order` is accepted for symmetry
/// with the other primitive readers even though byte slices themselves
/// carry no endianness.
pub fn slice_field(buf: &[u8], offset: usize, len: u16, _order: ByteOrder) -> CResult<&[u8]> {
    let end = offset
        .checked_add(len as usize)
        .ok_or_else(|| Error::CorruptLog("field length overflow".to_string()))?;
    buf.get(offset..end).ok_or_else(|| {
        Error::CorruptLog(format!("field out of range: offset={offset} len={len} buf_len={}", buf.len()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_zero() {
        assert_eq!(decode_number(&[0x80]).unwrap(), "0");
    }

    #[test]
    fn decodes_positive_integer() {
        // 123 = exponent byte 0xC2 (2 integer digit-groups), digit groups
        // "1" (0x02 - 1) and "23" (0x18 - 1)
        let bytes = [0xC2, 0x02, 0x18];
        assert_eq!(decode_number(&bytes).unwrap(), "123");
    }

    #[test]
    fn decodes_single_digit_without_leading_zero() {
        let bytes = [0xC1, 0x02];
        assert_eq!(decode_number(&bytes).unwrap(), "1");
    }

    #[test]
    fn decodes_negative_integer() {
        // -45 = exponent byte 0x3E (1 integer digit-group), digit 101-56=45
        let bytes = [0x3E, 0x38];
        assert_eq!(decode_number(&bytes).unwrap(), "-45");
    }

    #[test]
    fn date_roundtrips_known_value() {
        // 2024-03-15 10:30:00
        let bytes = [120, 124, 3, 15, 11, 31, 1];
        assert_eq!(decode_date(&bytes).unwrap(), "2024-03-15T10:30:00");
    }

    #[test]
    fn binary_float_decodes_positive() {
        let raw = 3.5f32.to_be_bytes();
        let mut flipped = raw;
        flipped[0] |= 0x80;
        assert_eq!(decode_binary_float(&flipped).unwrap(), 3.5f32);
    }

    #[test]
    fn raw_type_is_hex_encoded() {
        let v = decode_column(ColumnType::Raw, &[0xDE, 0xAD]).unwrap();
        assert_eq!(v, ColumnValue::Bytes("dead".to_string()));
    }

    #[test]
    fn null_bytes_decode_to_null() {
        let v = decode_column(ColumnType::Number, &[]).unwrap();
        assert_eq!(v, ColumnValue::Null);
    }
}
