// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Wharf Contributors

//! Daemon configuration: fixed paths under the state directory.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine state directory (no $XDG_STATE_HOME or home directory)")]
    NoStateDir,
}

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Root state directory (e.g. ~/.local/state/wharf)
    pub state_dir: PathBuf,
    /// Directory committed images live in
    pub images_dir: PathBuf,
    /// Per-instance log files
    pub logs_dir: PathBuf,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    /// Path to daemon log file
    pub log_path: PathBuf,
}

impl Config {
    /// Load configuration for the user-level daemon.
    ///
    /// Uses fixed paths under `~/.local/state/wharf/` (or
    /// `$XDG_STATE_HOME/wharf/`).
    pub fn load() -> Result<Self, ConfigError> {
        let state_dir = dirs::state_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join(".local/state")))
            .ok_or(ConfigError::NoStateDir)?
            .join("wharf");
        Ok(Self::at(state_dir))
    }

    /// Configuration rooted at an explicit state directory.
    pub fn at(state_dir: impl Into<PathBuf>) -> Self {
        let state_dir = state_dir.into();
        Self {
            images_dir: state_dir.join("images"),
            logs_dir: state_dir.join("logs"),
            lock_path: state_dir.join("daemon.pid"),
            log_path: state_dir.join("daemon.log"),
            state_dir,
        }
    }

    /// Create the directories this config points at.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.images_dir)?;
        std::fs::create_dir_all(&self.logs_dir)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
