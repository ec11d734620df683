// Command file source - one shell command per non-blank line
use std::fs;
use std::path::Path;
use tracing::info;

use batchrun_core::domain::{parse_commands, Command};
use batchrun_core::error::{AppError, Result};

/// Read and parse a command file
///
/// # Errors
/// `AppError::Config` when the file is missing, not a regular file, or
/// unreadable. Nothing has run at that point, so the batch is aborted.
pub fn read_command_file(path: impl AsRef<Path>) -> Result<Vec<Command>> {
    let path = path.as_ref();

    if !path.is_file() {
        return Err(AppError::Config(format!(
            "The file {} does not exist",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        AppError::Config(format!("Error reading file {}: {}", path.display(), e))
    })?;

    let commands = parse_commands(&contents);
    info!(
        path = %path.display(),
        lines = contents.lines().count(),
        commands = commands.len(),
        "Command file loaded"
    );
    Ok(commands)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_file(name: &str, contents: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "batchrun_command_file_{}_{}.txt",
            name,
            std::process::id()
        ));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_reads_non_blank_lines() {
        let path = temp_file(
            "basic",
            b"unwrap.py -d 20200101_20200113\n\n  \nunwrap.py -d 20200113_20200125\n",
        );

        let commands = read_command_file(&path).unwrap();
        let _ = fs::remove_file(&path);

        assert_eq!(commands.len(), 2);
        assert_eq!(commands[1].as_str(), "unwrap.py -d 20200113_20200125");
        assert_eq!(commands[1].index(), 1);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = read_command_file("/nonexistent/run_11_unwrap.txt").unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_directory_is_config_error() {
        let err = read_command_file(std::env::temp_dir()).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_invalid_utf8_is_config_error() {
        let path = temp_file("binary", &[0xff, 0xfe, 0x00, b'\n']);

        let err = read_command_file(&path).unwrap_err();
        let _ = fs::remove_file(&path);

        assert!(err.is_config());
        assert!(err.to_string().contains("Error reading file"));
    }
}
