// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{RawShellSettings, ShellSettings};
use crate::errors::Result;

/// Read and deserialize a settings file without validating it.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawShellSettings> {
    let contents = fs::read_to_string(path.as_ref())?;
    let raw: RawShellSettings = toml::from_str(&contents)?;
    Ok(raw)
}

/// Load a settings file and validate it.
///
/// - Reads TOML.
/// - Applies defaults for missing keys (via `serde`).
/// - Rejects zero limits, an empty `exit_values` list and a
///   `working_directory` that does not exist.
pub fn load_settings(path: impl AsRef<Path>) -> Result<ShellSettings> {
    let raw = load_from_path(path)?;
    ShellSettings::try_from(raw)
}

/// `Procpump.toml` in the current working directory.
pub fn default_settings_path() -> PathBuf {
    PathBuf::from("Procpump.toml")
}
