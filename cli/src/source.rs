//! Resolves a redo-log sequence number to a file handle under a
//! directory -- the CLI's concrete `LogSource` (the core only ever sees
//! an abstract collaborator, never a filesystem path, matching the
//! teacher's pattern of keeping storage backends behind a trait such as
//! `storage::engine::Engine`).

use std::fs::File;
use std::path::PathBuf;

use redo_replay::error::CResult;
use redo_replay::logfile::LogKind;
use redo_replay::replay_loop::LogSource;

/// Looks for `<online_dir>/<sequence>.redo` first (an online log still
/// being written), then falls back to `<archived_dir>/<sequence>.redo`.
pub struct DirLogSource {
    online_dir: PathBuf,
    archived_dir: PathBuf,
}

impl DirLogSource {
    pub fn new(online_dir: PathBuf, archived_dir: PathBuf) -> DirLogSource {
        DirLogSource { online_dir, archived_dir }
    }

    fn path_for(dir: &PathBuf, sequence: u32) -> PathBuf {
        dir.join(format!("{sequence}.redo"))
    }
}

impl LogSource for DirLogSource {
    type Reader = File;

    fn open(&mut self, sequence: u32) -> CResult<Option<(File, LogKind)>> {
        let online_path = Self::path_for(&self.online_dir, sequence);
        if online_path.exists() {
            return Ok(Some((File::open(online_path)?, LogKind::Online)));
        }
        let archived_path = Self::path_for(&self.archived_dir, sequence);
        if archived_path.exists() {
            return Ok(Some((File::open(archived_path)?, LogKind::Archived)));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn prefers_online_copy_when_both_present() {
        let dir = tempfile::tempdir().unwrap();
        let online = dir.path().join("online");
        let archived = dir.path().join("archived");
        fs::create_dir_all(&online).unwrap();
        fs::create_dir_all(&archived).unwrap();
        fs::write(online.join("7.redo"), b"online").unwrap();
        fs::write(archived.join("7.redo"), b"archived").unwrap();

        let mut source = DirLogSource::new(online, archived);
        let (_, kind) = source.open(7).unwrap().expect("present");
        assert_eq!(kind, LogKind::Online);
    }

    #[test]
    fn falls_back_to_archived_copy() {
        let dir = tempfile::tempdir().unwrap();
        let online = dir.path().join("online");
        let archived = dir.path().join("archived");
        fs::create_dir_all(&online).unwrap();
        fs::create_dir_all(&archived).unwrap();
        fs::write(archived.join("3.redo"), b"archived").unwrap();

        let mut source = DirLogSource::new(online, archived);
        let (_, kind) = source.open(3).unwrap().expect("present");
        assert_eq!(kind, LogKind::Archived);
    }

    #[test]
    fn missing_sequence_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = DirLogSource::new(dir.path().join("online"), dir.path().join("archived"));
        assert!(source.open(1).unwrap().is_none());
    }
}
