//! Replay engine configuration (spec.md §6's "Configuration" table),
//! loaded by the CLI crate via `confy` and passed into the core by
//! value.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimestampFormat {
    Unix,
    Iso8601,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScnFormat {
    Numeric,
    Hex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColumnFormat {
    ChangedOnly,
    FullInsertDelete,
    FullUpdate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DisableChecks {
    pub grants: bool,
    pub supplemental_log: bool,
    pub block_checksum: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderStart {
    pub start_scn: Option<u64>,
    pub start_seq: Option<u32>,
    pub start_time: Option<String>,
    pub start_time_rel: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayFlags {
    pub arch_only: bool,
    pub schema_keep: bool,
    pub show_incomplete_transactions: bool,
    pub show_system_transactions: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputFormat {
    pub timestamp: TimestampFormat,
    pub scn: ScnFormat,
    pub column: ColumnFormat,
}

impl Default for OutputFormat {
    fn default() -> Self {
        OutputFormat { timestamp: TimestampFormat::Iso8601, scn: ScnFormat::Hex, column: ColumnFormat::FullUpdate }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    pub source_reader: ReaderStart,
    pub arena_size_mb: usize,
    pub max_concurrent_transactions: usize,
    pub checkpoint_interval_s: u64,
    pub disable_checks: DisableChecks,
    pub flags: ReplayFlags,
    pub format: OutputFormat,
    pub checkpoint_dir: String,
    pub checkpoint_keep: usize,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        ReplayConfig {
            source_reader: ReaderStart::default(),
            arena_size_mb: 256,
            max_concurrent_transactions: 4096,
            checkpoint_interval_s: 60,
            disable_checks: DisableChecks::default(),
            flags: ReplayFlags::default(),
            format: OutputFormat::default(),
            checkpoint_dir: "checkpoints".to_string(),
            checkpoint_keep: 5,
        }
    }
}
