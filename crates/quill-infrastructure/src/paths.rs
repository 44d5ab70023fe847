//! Path management for quill data files.

use quill_core::{QuillError, Result};
use std::path::PathBuf;

/// Unified path resolution for quill.
///
/// # Directory Structure
///
/// ```text
/// ~/.config/quill/             # Config directory
/// ├── secret.json              # Connection settings and API keys
/// └── store/                   # TOML stores
///     ├── groups/
///     ├── messages/
///     ├── sessions/
///     └── humans/
/// ```
pub struct QuillPaths;

impl QuillPaths {
    /// Returns the quill configuration directory (`~/.config/quill`).
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| QuillError::config("Cannot find home directory"))?;
        Ok(home.join(".config").join("quill"))
    }

    /// Returns the base directory of the TOML stores.
    pub fn store_dir() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("store"))
    }
}
