// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::sync::Arc;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShellError {
    /// A pumper (or other one-shot component) was used after it was closed.
    #[error("Invalid state: {0}")]
    InvalidState(&'static str),

    #[error("Unacceptable exit code {code}")]
    InvalidExitCode { code: i32 },

    #[error("Failed to launch '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: Arc<std::io::Error>,
    },

    #[error("Invalid command line: {0}")]
    InvalidCommandLine(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ShellError {
    /// The exit code carried by an [`ShellError::InvalidExitCode`], if any.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ShellError::InvalidExitCode { code } => Some(*code),
            _ => None,
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, ShellError>;
