//! File system paths for the fault manager.

use crate::{ConfigError, ConfigResult};
use std::path::PathBuf;

/// Directory name created under the home directory.
const BASE_DIR_NAME: &str = ".fm";

/// Manages file system paths for the fault manager.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory for runtime files (~/.fm)
    base_dir: PathBuf,
}

impl Paths {
    /// Create a new Paths instance rooted at `~/.fm`.
    pub fn new() -> ConfigResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| ConfigError::Path("Could not determine home directory".to_string()))?;

        Ok(Self {
            base_dir: home.join(BASE_DIR_NAME),
        })
    }

    /// Create a new Paths instance with a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory.
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the config file path (`<base>/fm.json`).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("fm.json")
    }

    /// Get the default alarm database path (`<base>/fm.db`).
    pub fn database_file(&self) -> PathBuf {
        self.base_dir.join("fm.db")
    }

    /// Get the logs directory.
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// Get the JSON-lines log file written by the manager.
    pub fn log_file(&self) -> PathBuf {
        self.logs_dir().join("fm-manager.jsonl")
    }

    /// Ensure all required directories exist.
    pub fn ensure_dirs(&self) -> ConfigResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_paths_layout_under_base_dir() {
        let paths = Paths::with_base_dir(PathBuf::from("/tmp/fm-test"));
        assert_eq!(paths.config_file(), PathBuf::from("/tmp/fm-test/fm.json"));
        assert_eq!(paths.database_file(), PathBuf::from("/tmp/fm-test/fm.db"));
        assert_eq!(
            paths.log_file(),
            PathBuf::from("/tmp/fm-test/logs/fm-manager.jsonl")
        );
    }

    #[test]
    fn test_ensure_dirs_creates_logs_dir() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().join("nested"));
        paths.ensure_dirs().unwrap();
        assert!(paths.logs_dir().is_dir());
    }
}
