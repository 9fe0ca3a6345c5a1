//! Output event shape (spec.md §6): what the assembler hands to the
//! output buffer, one per committed row change, DDL statement, or
//! optional begin/commit/rollback marker.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::{OutputFormat, ScnFormat, TimestampFormat};
use crate::error::CResult;
use crate::ids::Xid;
use crate::primitives::Scn;
use crate::schema::ColumnValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Insert,
    Update,
    Delete,
    Ddl,
    Begin,
    Commit,
    Rollback,
    Gap,
}

pub type ColumnMap = BTreeMap<String, ColumnValue>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputEvent {
    pub op: OperationKind,
    pub owner: Option<String>,
    pub table: Option<String>,
    pub row_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<ColumnMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<ColumnMap>,
    pub scn: Scn,
    pub commit_timestamp: String,
    pub xid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ddl_text: Option<String>,
}

impl OutputEvent {
    pub fn commit_marker(xid: Xid, scn: Scn, commit_timestamp: String) -> OutputEvent {
        OutputEvent {
            op: OperationKind::Commit,
            owner: None,
            table: None,
            row_id: None,
            before: None,
            after: None,
            scn,
            commit_timestamp,
            xid: xid.to_string(),
            ddl_text: None,
        }
    }

    pub fn rollback_notice(xid: Xid, scn: Scn, commit_timestamp: String) -> OutputEvent {
        OutputEvent {
            op: OperationKind::Rollback,
            owner: None,
            table: None,
            row_id: None,
            before: None,
            after: None,
            scn,
            commit_timestamp,
            xid: xid.to_string(),
            ddl_text: None,
        }
    }

    pub fn gap(xid: Xid, scn: Scn, commit_timestamp: String) -> OutputEvent {
        OutputEvent {
            op: OperationKind::Gap,
            owner: None,
            table: None,
            row_id: None,
            before: None,
            after: None,
            scn,
            commit_timestamp,
            xid: xid.to_string(),
            ddl_text: None,
        }
    }

    /// Renders the wire form honoring `format.scn`/`format.timestamp`
    /// (spec.md §6). The in-memory event always keeps the real `Scn` and
    /// an ISO-8601 timestamp; this is the one place those get downgraded
    /// to the configured on-the-wire shape.
    pub fn to_wire_bytes(&self, format: &OutputFormat) -> CResult<Vec<u8>> {
        let scn = match format.scn {
            ScnFormat::Hex => serde_json::Value::String(self.scn.to_string()),
            ScnFormat::Numeric => serde_json::Value::Number(self.scn.0.into()),
        };
        let commit_timestamp = match format.timestamp {
            TimestampFormat::Iso8601 => self.commit_timestamp.clone(),
            TimestampFormat::Unix => unix_seconds_from_iso8601(&self.commit_timestamp)
                .map(|s| s.to_string())
                .unwrap_or_else(|| self.commit_timestamp.clone()),
        };
        let wire = WireEvent {
            op: self.op,
            owner: self.owner.clone(),
            table: self.table.clone(),
            row_id: self.row_id.clone(),
            before: self.before.clone(),
            after: self.after.clone(),
            scn,
            commit_timestamp,
            xid: self.xid.clone(),
            ddl_text: self.ddl_text.clone(),
        };
        Ok(serde_json::to_vec(&wire)?)
    }
}

#[derive(Serialize)]
struct WireEvent {
    op: OperationKind,
    owner: Option<String>,
    table: Option<String>,
    row_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    before: Option<ColumnMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    after: Option<ColumnMap>,
    scn: serde_json::Value,
    commit_timestamp: String,
    xid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    ddl_text: Option<String>,
}

/// Parses the fixed `YYYY-MM-DDTHH:MM:SSZ` shape this engine always
/// produces into Unix seconds, without reaching for a date/time crate
/// (unavailable in this crate per DESIGN.md -- `chrono` stayed out of
/// `replay/`). Returns `None` on anything that doesn't match the shape.
fn unix_seconds_from_iso8601(s: &str) -> Option<i64> {
    let bytes = s.as_bytes();
    if bytes.len() != 20 || bytes[19] != b'Z' {
        return None;
    }
    let year: i64 = s.get(0..4)?.parse().ok()?;
    let month: i64 = s.get(5..7)?.parse().ok()?;
    let day: i64 = s.get(8..10)?.parse().ok()?;
    let hour: i64 = s.get(11..13)?.parse().ok()?;
    let minute: i64 = s.get(14..16)?.parse().ok()?;
    let second: i64 = s.get(17..19)?.parse().ok()?;

    // Howard Hinnant's days-from-civil algorithm, proleptic Gregorian.
    let y = if month <= 2 { year - 1 } else { year };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400;
    let mp = (month + 9) % 12;
    let doy = (153 * mp + 2) / 5 + day - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    let days_since_epoch = era * 146097 + doe - 719468;

    Some(days_since_epoch * 86400 + hour * 3600 + minute * 60 + second)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputFormat;

    #[test]
    fn unix_epoch_parses_to_zero() {
        assert_eq!(unix_seconds_from_iso8601("1970-01-01T00:00:00Z"), Some(0));
    }

    #[test]
    fn known_instant_round_trips() {
        // 2024-03-15T10:30:00Z, checked against date -u -d ... +%s
        assert_eq!(unix_seconds_from_iso8601("2024-03-15T10:30:00Z"), Some(1710498600));
    }

    #[test]
    fn wire_bytes_honor_scn_format() {
        let event = OutputEvent::commit_marker(Xid::new(1, 2, 3), Scn(0x10), "1970-01-01T00:00:00Z".into());
        let hex_format = OutputFormat { scn: ScnFormat::Hex, ..OutputFormat::default() };
        let numeric_format = OutputFormat { scn: ScnFormat::Numeric, ..OutputFormat::default() };

        let hex_json: serde_json::Value = serde_json::from_slice(&event.to_wire_bytes(&hex_format).unwrap()).unwrap();
        assert_eq!(hex_json["scn"], serde_json::json!("0x0000000000000010"));

        let numeric_json: serde_json::Value =
            serde_json::from_slice(&event.to_wire_bytes(&numeric_format).unwrap()).unwrap();
        assert_eq!(numeric_json["scn"], serde_json::json!(16));
    }

    #[test]
    fn wire_bytes_honor_timestamp_format() {
        let event = OutputEvent::commit_marker(Xid::new(1, 2, 3), Scn(0x10), "1970-01-01T00:00:01Z".into());
        let unix_format = OutputFormat { timestamp: TimestampFormat::Unix, ..OutputFormat::default() };
        let json: serde_json::Value = serde_json::from_slice(&event.to_wire_bytes(&unix_format).unwrap()).unwrap();
        assert_eq!(json["commit_timestamp"], serde_json::json!("1"));
    }
}
