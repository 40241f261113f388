// src/lib.rs

//! Child-process I/O pumping.
//!
//! Moves bytes between this process and its children using readiness
//! callbacks and a shared worker pool instead of a thread per stream, with
//! bounded buffering in both directions, line-oriented output logging, and
//! coordinated shutdown of everything still running.

pub mod cli;
pub mod command_line;
pub mod config;
pub mod errors;
pub mod exec;
pub mod io;
pub mod logging;
pub mod shell;

use std::path::Path;

use anyhow::{Context, Result};
use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::cli::CliArgs;
use crate::config::{ShellSettings, default_settings_path, load_settings};
use crate::errors::ShellError;
use crate::shell::Shell;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - settings loading (explicit `--config`, else `Procpump.toml` if present)
/// - the shell and its shutdown hooks
/// - Ctrl-C handling
/// - running the program and waiting for its output to drain
///
/// Returns the program's exit code.
pub async fn run(args: CliArgs) -> Result<i32> {
    let mut settings = resolve_settings(args.config.as_deref())?;
    if let Some(cwd) = &args.cwd {
        settings.working_directory = Some(cwd.clone());
    }

    let shell = Shell::from_settings(&settings, Handle::current());
    let _ctrl_c = shell.shutdown_hooks().listen_for_ctrl_c();
    let shell = if args.lines {
        shell.trace_output()
    } else {
        shell
    };

    let Some((program, program_args)) = args.command.split_first() else {
        anyhow::bail!("no program given");
    };
    let process = shell.program(program.clone(), |c| {
        c.args(program_args.iter().cloned());
        if !args.accept.is_empty() {
            c.accept_exit_values(args.accept.iter().copied());
        }
        if args.stdin {
            c.stdin(std::io::stdin());
        }
    });

    let result = process.wait_for_async().await;
    process.output_drained().await;

    match result {
        Ok(code) => {
            debug!(program = %program, exit_code = code, "program finished");
            Ok(code)
        }
        Err(ShellError::InvalidExitCode { code }) => {
            warn!(program = %program, exit_code = code, "program exited with an unacceptable code");
            Ok(code)
        }
        Err(e) => Err(e).with_context(|| format!("running {program}")),
    }
}

fn resolve_settings(explicit: Option<&Path>) -> Result<ShellSettings> {
    if let Some(path) = explicit {
        return load_settings(path).with_context(|| format!("loading settings from {path:?}"));
    }
    let default_path = default_settings_path();
    if default_path.is_file() {
        debug!(path = ?default_path, "using default settings file");
        return load_settings(&default_path)
            .with_context(|| format!("loading settings from {default_path:?}"));
    }
    Ok(ShellSettings::default())
}
