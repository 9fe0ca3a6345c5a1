#[cfg(test)]
mod test {
    use assert_cmd::prelude::*;
    use assert_fs::prelude::*;
    use predicates::prelude::*;
    use std::process::Command;

    #[test]
    fn help_lists_log_directory_flags() -> Result<(), Box<dyn std::error::Error>> {
        let mut cmd = Command::cargo_bin("redo-replay-cli")?;

        cmd.arg("--help");
        cmd.assert()
            .success()
            .stdout(predicate::str::contains("--online-dir"))
            .stdout(predicate::str::contains("--archived-dir"));

        Ok(())
    }

    #[test]
    fn missing_required_log_directories_fails() -> Result<(), Box<dyn std::error::Error>> {
        let mut cmd = Command::cargo_bin("redo-replay-cli")?;

        cmd.arg("--database-identity").arg("demo");
        cmd.assert()
            .failure()
            .stderr(predicate::str::contains("--online-dir"));

        Ok(())
    }

    #[test]
    fn unknown_flag_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let mut cmd = Command::cargo_bin("redo-replay-cli")?;

        cmd.arg("--not-a-real-flag");
        cmd.assert().failure();

        Ok(())
    }

    #[test]
    fn malformed_bootstrap_dictionary_file_fails_before_replay_starts() -> Result<(), Box<dyn std::error::Error>> {
        let dictionary_file = assert_fs::NamedTempFile::new("bootstrap.json")?;
        dictionary_file.write_str("{ not valid json")?;

        let online_dir = assert_fs::TempDir::new()?;
        let archived_dir = assert_fs::TempDir::new()?;

        let mut cmd = Command::cargo_bin("redo-replay-cli")?;
        cmd.arg("--online-dir")
            .arg(online_dir.path())
            .arg("--archived-dir")
            .arg(archived_dir.path())
            .arg("--bootstrap-dictionary")
            .arg(dictionary_file.path());
        cmd.assert().failure();

        Ok(())
    }
}
