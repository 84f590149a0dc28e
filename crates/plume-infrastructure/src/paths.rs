//! Unified path management for plume data files.
//!
//! All durable plume data lives under the platform config directory:
//!
//! ```text
//! ~/.config/plume/             # Config directory (XDG on Linux/macOS)
//! └── drafts.json              # Serialized draft collection
//! ```

use std::path::PathBuf;

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// Home directory could not be determined.
    HomeDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::HomeDirNotFound => write!(f, "Cannot find home directory"),
        }
    }
}

impl std::error::Error for PathError {}

/// Unified path management for plume.
pub struct PlumePaths;

impl PlumePaths {
    /// Returns the plume configuration directory.
    ///
    /// # Returns
    ///
    /// - `Ok(PathBuf)`: Path to config directory (e.g., `~/.config/plume/`)
    /// - `Err(PathError::HomeDirNotFound)`: Could not determine directory
    pub fn config_dir() -> Result<PathBuf, PathError> {
        dirs::config_dir()
            .map(|dir| dir.join("plume"))
            .ok_or(PathError::HomeDirNotFound)
    }

    /// Returns the path to the serialized draft collection.
    pub fn drafts_file() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("drafts.json"))
    }
}
