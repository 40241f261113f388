// src/config/model.rs

use std::path::PathBuf;

use serde::Deserialize;

use crate::exec::input_pumper::DEFAULT_READ_AHEAD;
use crate::exec::output_pumper::DEFAULT_OUTPUT_LIMIT;

/// Shell settings as read from a TOML file, before validation.
///
/// ```toml
/// working_directory = "/srv/build"
/// log_commands = true
/// stdin_read_ahead = 131072
/// output_buffer_limit = 20971520
/// force_kill_on_shutdown = true
/// exit_values = [0]
/// ```
///
/// Every key is optional.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawShellSettings {
    /// Directory commands run in; defaults to the current directory.
    #[serde(default)]
    pub working_directory: Option<PathBuf>,

    /// Log each command line before launching it.
    #[serde(default = "default_true")]
    pub log_commands: bool,

    /// Bytes read from a stdin source ahead of the child consuming them.
    #[serde(default = "default_stdin_read_ahead")]
    pub stdin_read_ahead: usize,

    /// Bytes of child output buffered ahead of a slow sink.
    #[serde(default = "default_output_buffer_limit")]
    pub output_buffer_limit: usize,

    /// SIGKILL (true) or SIGTERM (false) for processes alive at shutdown.
    #[serde(default = "default_true")]
    pub force_kill_on_shutdown: bool,

    /// Exit codes considered successful unless a command says otherwise.
    #[serde(default = "default_exit_values")]
    pub exit_values: Vec<i32>,
}

fn default_true() -> bool {
    true
}

fn default_stdin_read_ahead() -> usize {
    DEFAULT_READ_AHEAD
}

fn default_output_buffer_limit() -> usize {
    DEFAULT_OUTPUT_LIMIT
}

fn default_exit_values() -> Vec<i32> {
    vec![0]
}

impl Default for RawShellSettings {
    fn default() -> Self {
        Self {
            working_directory: None,
            log_commands: default_true(),
            stdin_read_ahead: default_stdin_read_ahead(),
            output_buffer_limit: default_output_buffer_limit(),
            force_kill_on_shutdown: default_true(),
            exit_values: default_exit_values(),
        }
    }
}

/// Validated shell settings. Build one with `TryFrom<RawShellSettings>` or
/// [`crate::config::load_settings`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellSettings {
    pub working_directory: Option<PathBuf>,
    pub log_commands: bool,
    pub stdin_read_ahead: usize,
    pub output_buffer_limit: usize,
    pub force_kill_on_shutdown: bool,
    pub exit_values: Vec<i32>,
}

impl ShellSettings {
    pub(crate) fn new_unchecked(raw: RawShellSettings) -> Self {
        Self {
            working_directory: raw.working_directory,
            log_commands: raw.log_commands,
            stdin_read_ahead: raw.stdin_read_ahead,
            output_buffer_limit: raw.output_buffer_limit,
            force_kill_on_shutdown: raw.force_kill_on_shutdown,
            exit_values: raw.exit_values,
        }
    }
}

impl Default for ShellSettings {
    fn default() -> Self {
        Self::new_unchecked(RawShellSettings::default())
    }
}
