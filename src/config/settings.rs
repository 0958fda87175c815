//! User settings and paths.
//!
//! An optional JSON file supplies defaults that command-line flags
//! override. The default location follows the XDG Base Directory
//! Specification (`~/.config/bps/settings.json` on Linux).

use crate::config::TimingProfile;
use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Application directory paths.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Configuration directory (~/.config/bps)
    pub config_dir: PathBuf,
}

impl Paths {
    /// Locate the platform configuration directory.
    pub fn discover() -> ConfigResult<Self> {
        let project = ProjectDirs::from("com", "bps", "bps").ok_or(ConfigError::DirectoryNotFound)?;

        Ok(Self {
            config_dir: project.config_dir().to_path_buf(),
        })
    }

    /// Get the path to the settings file.
    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("settings.json")
    }
}

/// Defaults applied when the matching flag is not given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Timing level (0-6).
    pub timing: u8,
    /// Report closed ports.
    pub show_closed: bool,
    /// Output format name (plain, json, csv).
    pub output_format: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timing: TimingProfile::DEFAULT_LEVEL,
            show_closed: false,
            output_format: "plain".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from the default location, falling back to defaults
    /// when no file exists.
    pub fn load() -> ConfigResult<Self> {
        let file = Paths::discover()?.settings_file();

        if !file.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&file)
    }

    /// Load settings from a specific file.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let settings: Self =
            serde_json::from_str(&content).map_err(|e| ConfigError::InvalidFormat(e.to_string()))?;

        if settings.timing > TimingProfile::MAX_LEVEL {
            return Err(ConfigError::TimingOutOfRange(settings.timing));
        }

        Ok(settings)
    }
}
