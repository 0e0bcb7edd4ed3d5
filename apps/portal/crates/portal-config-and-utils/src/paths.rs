//! File system paths for the portal client.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;

/// Directory name under the user's home directory.
const BASE_DIR_NAME: &str = ".hwlg";
/// Persistent client storage file (the equivalent of browser local storage).
const LOCAL_STORAGE_FILE: &str = "local-storage.json";

/// Manages file system paths for the portal client.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory for client files (~/.hwlg)
    base_dir: PathBuf,
}

impl Paths {
    /// Create a new Paths instance rooted at `~/.hwlg`.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir().ok_or(CoreError::HomeDirUnavailable)?;

        Ok(Self {
            base_dir: home.join(BASE_DIR_NAME),
        })
    }

    /// Create a new Paths instance with a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory (~/.hwlg).
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the config file path (~/.hwlg/config.json).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Get the persistent client storage file (~/.hwlg/local-storage.json).
    pub fn local_storage_file(&self) -> PathBuf {
        self.base_dir.join(LOCAL_STORAGE_FILE)
    }

    /// Get the logs directory (~/.hwlg/logs).
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// Get the structured log file (~/.hwlg/logs/portal.jsonl).
    pub fn log_file(&self) -> PathBuf {
        self.logs_dir().join("portal.jsonl")
    }

    /// Ensure all required directories exist.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}
