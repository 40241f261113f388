// src/shell/mod.rs

//! The caller-facing API: a [`Shell`] launches commands within a layered
//! [`ShellContext`].
//!
//! ```no_run
//! use procpump::shell::{BashOptions, Shell};
//!
//! # fn main() -> procpump::errors::Result<()> {
//! let rt = tokio::runtime::Runtime::new()?;
//! let shell = Shell::new(rt.handle().clone());
//!
//! let (process, output) = shell.collect_stdout(|sh| sh.program("echo", |c| {
//!     c.arg("hello");
//! }));
//! process.wait_for()?;
//! assert_eq!(output.text(), "hello\n");
//!
//! shell
//!     .bash("exit 1", BashOptions::default(), |c| {
//!         c.accept_exit_values([0, 1]);
//!     })
//!     .wait_for()?;
//! # Ok(())
//! # }
//! ```

pub mod context;
pub mod process_config;

use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::Level;

use crate::command_line::split_command_line;
use crate::config::ShellSettings;
use crate::errors::{Result, ShellError};
use crate::exec::{ProcessStopper, ShellProcess, ShutdownHooks, start};
use crate::io::{ByteSink, CollectedOutput, LineDecoder, tracing_lines};

pub use context::{ShellContext, ShellOverrides, SinkProducer, inherit_stderr, inherit_stdout};
pub use process_config::{ProcessConfiguration, SinkChoice};

/// Options for [`Shell::bash`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BashOptions {
    /// Prefix the script with `set -euo pipefail`.
    pub sane_error_handling: bool,
    /// Trace each command (`set -x`).
    pub print_commands: bool,
}

impl Default for BashOptions {
    fn default() -> Self {
        Self {
            sane_error_handling: true,
            print_commands: false,
        }
    }
}

impl BashOptions {
    /// The script bash actually runs.
    pub fn wrap(&self, script: &str) -> String {
        let mut options = String::new();
        if self.print_commands {
            options.push('x');
        }
        if self.sane_error_handling {
            options.push_str("euo pipefail");
        }
        if options.is_empty() {
            script.to_string()
        } else {
            format!("set -{options}\n{script}")
        }
    }
}

/// Launches commands. Cheap to clone; clones share the context and hooks.
#[derive(Debug, Clone)]
pub struct Shell {
    ctx: Arc<ShellContext>,
    hooks: ShutdownHooks,
}

impl Shell {
    /// A shell on `handle` whose processes are SIGKILLed when its shutdown
    /// hooks run.
    pub fn new(handle: Handle) -> Self {
        Self::from_settings(&ShellSettings::default(), handle)
    }

    pub fn from_settings(settings: &ShellSettings, handle: Handle) -> Self {
        let hooks = ShutdownHooks::new();
        let stopper = ProcessStopper::install(&hooks, settings.force_kill_on_shutdown);
        let ctx = ShellContext::from_settings(settings, handle, stopper);
        Self {
            ctx: Arc::new(ctx),
            hooks,
        }
    }

    /// A shell over an explicit context. `hooks` is what
    /// [`Self::shutdown_hooks`] hands out.
    pub fn with_context(ctx: ShellContext, hooks: ShutdownHooks) -> Self {
        Self {
            ctx: Arc::new(ctx),
            hooks,
        }
    }

    pub fn context(&self) -> &ShellContext {
        &self.ctx
    }

    pub fn shutdown_hooks(&self) -> &ShutdownHooks {
        &self.hooks
    }

    /// Derive a child shell; `self` is unaffected.
    pub fn scoped(&self, configure: impl FnOnce(&mut ShellOverrides)) -> Shell {
        let mut overrides = ShellOverrides::default();
        configure(&mut overrides);
        self.with_overrides(&overrides)
    }

    pub fn with_overrides(&self, overrides: &ShellOverrides) -> Shell {
        Self {
            ctx: Arc::new(self.ctx.layered(overrides)),
            hooks: self.hooks.clone(),
        }
    }

    /// Run a program by name. Its arguments come from `configure`.
    pub fn program(
        &self,
        name: impl Into<String>,
        configure: impl FnOnce(&mut ProcessConfiguration),
    ) -> ShellProcess {
        let mut config = self.new_configuration();
        config.arg(name);
        configure(&mut config);
        start(config, &self.ctx)
    }

    /// Run a command line such as `"ls -la"`, then `extra_args` appended
    /// verbatim (pass `"--flag", "value"`, not `"--flag value"`).
    pub fn command<I, S>(
        &self,
        command: &str,
        extra_args: I,
        configure: impl FnOnce(&mut ProcessConfiguration),
    ) -> Result<ShellProcess>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut parts = split_command_line(command)?.into_iter();
        let Some(program) = parts.next() else {
            return Err(ShellError::InvalidCommandLine("empty command".to_string()));
        };
        Ok(self.program(program, |c| {
            c.args(parts).args(extra_args);
            configure(c);
        }))
    }

    /// Run `script` with `bash -c`. Arguments added by `configure` become
    /// `$0`, `$1`, ... of the script.
    pub fn bash(
        &self,
        script: &str,
        options: BashOptions,
        configure: impl FnOnce(&mut ProcessConfiguration),
    ) -> ShellProcess {
        let script = options.wrap(script);
        self.program("bash", |c| {
            c.arg("-c").arg(script);
            configure(c);
        })
    }

    /// Run `f` with a shell whose default stdout is collected.
    ///
    /// The [`CollectedOutput`] blocks on read until every process started
    /// through that shell has closed its stdout.
    pub fn collect_stdout<T>(&self, f: impl FnOnce(&Shell) -> T) -> (T, CollectedOutput) {
        let output = CollectedOutput::new();
        let shell = self.scoped(|o| {
            o.default_stdout(collect_into(&output));
        });
        (f(&shell), output)
    }

    /// As [`Self::collect_stdout`], for stderr.
    pub fn collect_stderr<T>(&self, f: impl FnOnce(&Shell) -> T) -> (T, CollectedOutput) {
        let output = CollectedOutput::new();
        let shell = self.scoped(|o| {
            o.default_stderr(collect_into(&output));
        });
        (f(&shell), output)
    }

    /// A child shell that hands stdout to a line callback made per process.
    pub fn log_stdout<F, L>(&self, make_logger: F) -> Shell
    where
        F: Fn(&ProcessConfiguration) -> L + Send + Sync + 'static,
        L: FnMut(&str) + Send + 'static,
    {
        let producer = line_sink(make_logger);
        self.scoped(|o| {
            o.default_stdout(producer);
        })
    }

    /// A child shell that hands stderr to a line callback made per process.
    pub fn log_stderr<F, L>(&self, make_logger: F) -> Shell
    where
        F: Fn(&ProcessConfiguration) -> L + Send + Sync + 'static,
        L: FnMut(&str) + Send + 'static,
    {
        let producer = line_sink(make_logger);
        self.scoped(|o| {
            o.default_stderr(producer);
        })
    }

    /// A child shell logging output lines as tracing events: stdout at
    /// `info`, stderr at `warn`.
    pub fn trace_output(&self) -> Shell {
        self.log_stdout(|c| tracing_lines(c.program().to_string(), "stdout", Level::INFO))
            .log_stderr(|c| tracing_lines(c.program().to_string(), "stderr", Level::WARN))
    }

    fn new_configuration(&self) -> ProcessConfiguration {
        ProcessConfiguration {
            exit_values: self.ctx.exit_values.clone(),
            ..ProcessConfiguration::default()
        }
    }
}

fn collect_into(output: &CollectedOutput) -> SinkProducer {
    let output = output.clone();
    Arc::new(move |_: &ProcessConfiguration| Some(Box::new(output.sink()) as Box<dyn ByteSink>))
}

fn line_sink<F, L>(make_logger: F) -> SinkProducer
where
    F: Fn(&ProcessConfiguration) -> L + Send + Sync + 'static,
    L: FnMut(&str) + Send + 'static,
{
    Arc::new(move |config: &ProcessConfiguration| {
        Some(Box::new(LineDecoder::new(make_logger(config))) as Box<dyn ByteSink>)
    })
}
