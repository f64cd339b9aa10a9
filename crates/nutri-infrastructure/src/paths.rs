//! Path management for nutri configuration files.
//!
//! ```text
//! ~/.config/nutri/             # Config directory (platform config dir)
//! └── config.toml              # Client configuration
//! ```

use std::path::{Path, PathBuf};

const APP_DIR: &str = "nutri";
const CONFIG_FILE: &str = "config.toml";

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// The platform config directory could not be determined.
    ConfigDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::ConfigDirNotFound => write!(f, "Cannot find config directory"),
        }
    }
}

impl std::error::Error for PathError {}

/// Resolves nutri's paths, optionally under an explicit base directory.
///
/// With a base path everything lives directly below it, which tests use to
/// stay out of the real config directory.
#[derive(Debug, Clone, Default)]
pub struct NutriPaths {
    base_path: Option<PathBuf>,
}

impl NutriPaths {
    pub fn new(base_path: Option<&Path>) -> Self {
        Self {
            base_path: base_path.map(Path::to_path_buf),
        }
    }

    /// Returns the nutri configuration directory (e.g. `~/.config/nutri/`).
    pub fn config_dir(&self) -> Result<PathBuf, PathError> {
        match &self.base_path {
            Some(base) => Ok(base.clone()),
            None => dirs::config_dir()
                .map(|dir| dir.join(APP_DIR))
                .ok_or(PathError::ConfigDirNotFound),
        }
    }

    /// Returns the path to the main configuration file.
    pub fn config_file(&self) -> Result<PathBuf, PathError> {
        Ok(self.config_dir()?.join(CONFIG_FILE))
    }
}
