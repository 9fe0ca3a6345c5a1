//! CLI-level configuration, loaded via `confy` and translated into
//! `redo_replay::config::ReplayConfig`. Mirrors the teacher's
//! `kv-cli/src/config.rs`: an `Option`-field struct with a hand-written
//! `Default`, loaded once at startup and overridden by explicit CLI
//! flags afterward.

use serde_derive::{Deserialize, Serialize};

use redo_replay::config::{
    ColumnFormat, DisableChecks, OutputFormat, ReplayConfig, ReplayFlags, ScnFormat, TimestampFormat,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigLoad {
    version: u8,

    pub arena_size_mb: Option<usize>,
    pub max_concurrent_transactions: Option<usize>,
    pub checkpoint_interval_s: Option<u64>,
    pub checkpoint_dir: Option<String>,
    pub checkpoint_keep: Option<usize>,

    pub disable_grants_check: Option<bool>,
    pub disable_supplemental_log_check: Option<bool>,
    pub disable_block_checksum: Option<bool>,

    pub arch_only: Option<bool>,
    pub schema_keep: Option<bool>,
    pub show_incomplete_transactions: Option<bool>,
    pub show_system_transactions: Option<bool>,

    pub format_timestamp: Option<String>,
    pub format_scn: Option<String>,
    pub format_column: Option<String>,
}

impl Default for ConfigLoad {
    fn default() -> Self {
        ConfigLoad {
            version: 0,
            arena_size_mb: None,
            max_concurrent_transactions: None,
            checkpoint_interval_s: None,
            checkpoint_dir: None,
            checkpoint_keep: None,
            disable_grants_check: None,
            disable_supplemental_log_check: None,
            disable_block_checksum: None,
            arch_only: None,
            schema_keep: None,
            show_incomplete_transactions: None,
            show_system_transactions: None,
            format_timestamp: None,
            format_scn: None,
            format_column: None,
        }
    }
}

impl ConfigLoad {
    pub fn load(path: &str) -> ConfigLoad {
        confy::load_path(path).unwrap_or_else(|err| {
            log::warn!("failed to load config at {path}: {err}, using defaults");
            ConfigLoad::default()
        })
    }

    /// Merges this loaded config over `ReplayConfig::default()`. CLI
    /// flags are applied by the caller afterward so they take final
    /// precedence over both the config file and these defaults.
    pub fn into_replay_config(self) -> ReplayConfig {
        let mut cfg = ReplayConfig::default();
        if let Some(v) = self.arena_size_mb {
            cfg.arena_size_mb = v;
        }
        if let Some(v) = self.max_concurrent_transactions {
            cfg.max_concurrent_transactions = v;
        }
        if let Some(v) = self.checkpoint_interval_s {
            cfg.checkpoint_interval_s = v;
        }
        if let Some(v) = self.checkpoint_dir {
            cfg.checkpoint_dir = v;
        }
        if let Some(v) = self.checkpoint_keep {
            cfg.checkpoint_keep = v;
        }

        cfg.disable_checks = DisableChecks {
            grants: self.disable_grants_check.unwrap_or(cfg.disable_checks.grants),
            supplemental_log: self
                .disable_supplemental_log_check
                .unwrap_or(cfg.disable_checks.supplemental_log),
            block_checksum: self.disable_block_checksum.unwrap_or(cfg.disable_checks.block_checksum),
        };

        cfg.flags = ReplayFlags {
            arch_only: self.arch_only.unwrap_or(cfg.flags.arch_only),
            schema_keep: self.schema_keep.unwrap_or(cfg.flags.schema_keep),
            show_incomplete_transactions: self
                .show_incomplete_transactions
                .unwrap_or(cfg.flags.show_incomplete_transactions),
            show_system_transactions: self
                .show_system_transactions
                .unwrap_or(cfg.flags.show_system_transactions),
        };

        cfg.format = OutputFormat {
            timestamp: parse_timestamp_format(self.format_timestamp.as_deref()).unwrap_or(cfg.format.timestamp),
            scn: parse_scn_format(self.format_scn.as_deref()).unwrap_or(cfg.format.scn),
            column: parse_column_format(self.format_column.as_deref()).unwrap_or(cfg.format.column),
        };

        cfg
    }
}

fn parse_timestamp_format(s: Option<&str>) -> Option<TimestampFormat> {
    match s? {
        "unix" => Some(TimestampFormat::Unix),
        "iso8601" => Some(TimestampFormat::Iso8601),
        other => {
            log::warn!("unknown format.timestamp '{other}', ignoring");
            None
        }
    }
}

fn parse_scn_format(s: Option<&str>) -> Option<ScnFormat> {
    match s? {
        "numeric" => Some(ScnFormat::Numeric),
        "hex" => Some(ScnFormat::Hex),
        other => {
            log::warn!("unknown format.scn '{other}', ignoring");
            None
        }
    }
}

fn parse_column_format(s: Option<&str>) -> Option<ColumnFormat> {
    match s? {
        "changed-only" => Some(ColumnFormat::ChangedOnly),
        "full-insert-delete" => Some(ColumnFormat::FullInsertDelete),
        "full-update" => Some(ColumnFormat::FullUpdate),
        other => {
            log::warn!("unknown format.column '{other}', ignoring");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_overrides_nothing() {
        let cfg = ConfigLoad::default().into_replay_config();
        assert_eq!(cfg.arena_size_mb, ReplayConfig::default().arena_size_mb);
        assert_eq!(cfg.checkpoint_dir, ReplayConfig::default().checkpoint_dir);
    }

    #[test]
    fn explicit_fields_override_defaults() {
        let mut load = ConfigLoad::default();
        load.arena_size_mb = Some(512);
        load.schema_keep = Some(true);
        load.format_scn = Some("numeric".to_string());
        let cfg = load.into_replay_config();
        assert_eq!(cfg.arena_size_mb, 512);
        assert!(cfg.flags.schema_keep);
        assert_eq!(cfg.format.scn, ScnFormat::Numeric);
    }

    #[test]
    fn unknown_format_falls_back_to_default() {
        let mut load = ConfigLoad::default();
        load.format_scn = Some("roman-numerals".to_string());
        let cfg = load.into_replay_config();
        assert_eq!(cfg.format.scn, ReplayConfig::default().format.scn);
    }
}
