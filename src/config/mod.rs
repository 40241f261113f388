// src/config/mod.rs

//! Settings for a [`crate::shell::Shell`], loaded from TOML.
//!
//! - `model.rs`: the serde data model and its defaults.
//! - `loader.rs`: reading a settings file from disk.
//! - `validate.rs`: semantic checks turning raw settings into [`ShellSettings`].

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_settings_path, load_from_path, load_settings};
pub use model::{RawShellSettings, ShellSettings};
