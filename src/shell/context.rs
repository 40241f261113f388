// src/shell/context.rs

//! Layered shell configuration.
//!
//! A [`ShellContext`] is fully resolved. Child shells are derived by applying
//! a [`ShellOverrides`] to a parent: a field set in the override wins,
//! anything unset is taken from the parent.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::runtime::Handle;

use crate::config::ShellSettings;
use crate::exec::input_pumper::DEFAULT_READ_AHEAD;
use crate::exec::output_pumper::DEFAULT_OUTPUT_LIMIT;
use crate::exec::{Executor, ProcessDriver, ShutdownHandler, TokioDriver};
use crate::io::{ByteSink, NoCloseSink};

use super::process_config::ProcessConfiguration;

/// Produces the sink for a stream whose configuration says `Inherit`.
/// `None` discards the stream.
pub type SinkProducer =
    Arc<dyn Fn(&ProcessConfiguration) -> Option<Box<dyn ByteSink>> + Send + Sync>;

/// Our own stdout, left open when the child's stream ends.
pub fn inherit_stdout() -> SinkProducer {
    Arc::new(|_: &ProcessConfiguration| {
        Some(Box::new(NoCloseSink::new(std::io::stdout())) as Box<dyn ByteSink>)
    })
}

/// Our own stderr, left open when the child's stream ends.
pub fn inherit_stderr() -> SinkProducer {
    Arc::new(|_: &ProcessConfiguration| {
        Some(Box::new(NoCloseSink::new(std::io::stderr())) as Box<dyn ByteSink>)
    })
}

#[derive(Clone)]
pub struct ShellContext {
    pub working_directory: PathBuf,
    /// Log each command before launching it.
    pub log_commands: bool,
    pub default_stdout: SinkProducer,
    pub default_stderr: SinkProducer,
    /// Exit codes new commands accept unless they configure their own.
    pub exit_values: Vec<i32>,
    /// Runs pump loops and exit callbacks.
    pub executor: Arc<dyn Executor>,
    pub driver: Arc<dyn ProcessDriver>,
    pub shutdown_handler: Arc<dyn ShutdownHandler>,
    pub stdin_read_ahead: usize,
    pub output_buffer_limit: usize,
}

impl fmt::Debug for ShellContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShellContext")
            .field("working_directory", &self.working_directory)
            .field("log_commands", &self.log_commands)
            .field("exit_values", &self.exit_values)
            .field("shutting_down", &self.shutdown_handler.is_shutting_down())
            .field("stdin_read_ahead", &self.stdin_read_ahead)
            .field("output_buffer_limit", &self.output_buffer_limit)
            .finish_non_exhaustive()
    }
}

impl ShellContext {
    /// Defaults on the given runtime: current directory, inherited stdio,
    /// default pump limits.
    pub fn new(handle: Handle, shutdown_handler: Arc<dyn ShutdownHandler>) -> Self {
        Self {
            working_directory: current_dir(),
            log_commands: true,
            default_stdout: inherit_stdout(),
            default_stderr: inherit_stderr(),
            exit_values: vec![0],
            executor: Arc::new(handle.clone()),
            driver: Arc::new(TokioDriver::new(handle)),
            shutdown_handler,
            stdin_read_ahead: DEFAULT_READ_AHEAD,
            output_buffer_limit: DEFAULT_OUTPUT_LIMIT,
        }
    }

    pub fn from_settings(
        settings: &ShellSettings,
        handle: Handle,
        shutdown_handler: Arc<dyn ShutdownHandler>,
    ) -> Self {
        let mut ctx = Self::new(handle, shutdown_handler);
        if let Some(dir) = &settings.working_directory {
            ctx.working_directory = dir.clone();
        }
        ctx.log_commands = settings.log_commands;
        ctx.exit_values = settings.exit_values.clone();
        ctx.stdin_read_ahead = settings.stdin_read_ahead;
        ctx.output_buffer_limit = settings.output_buffer_limit;
        ctx
    }

    /// `overrides` on top of `self`.
    pub fn layered(&self, overrides: &ShellOverrides) -> Self {
        let o = overrides.clone();
        Self {
            working_directory: o
                .working_directory
                .unwrap_or_else(|| self.working_directory.clone()),
            log_commands: o.log_commands.unwrap_or(self.log_commands),
            default_stdout: o
                .default_stdout
                .unwrap_or_else(|| Arc::clone(&self.default_stdout)),
            default_stderr: o
                .default_stderr
                .unwrap_or_else(|| Arc::clone(&self.default_stderr)),
            exit_values: o.exit_values.unwrap_or_else(|| self.exit_values.clone()),
            executor: o.executor.unwrap_or_else(|| Arc::clone(&self.executor)),
            driver: o.driver.unwrap_or_else(|| Arc::clone(&self.driver)),
            shutdown_handler: o
                .shutdown_handler
                .unwrap_or_else(|| Arc::clone(&self.shutdown_handler)),
            stdin_read_ahead: o.stdin_read_ahead.unwrap_or(self.stdin_read_ahead),
            output_buffer_limit: o.output_buffer_limit.unwrap_or(self.output_buffer_limit),
        }
    }
}

fn current_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Optional replacements for [`ShellContext`] fields.
#[derive(Clone, Default)]
pub struct ShellOverrides {
    pub working_directory: Option<PathBuf>,
    pub log_commands: Option<bool>,
    pub default_stdout: Option<SinkProducer>,
    pub default_stderr: Option<SinkProducer>,
    pub exit_values: Option<Vec<i32>>,
    pub executor: Option<Arc<dyn Executor>>,
    pub driver: Option<Arc<dyn ProcessDriver>>,
    pub shutdown_handler: Option<Arc<dyn ShutdownHandler>>,
    pub stdin_read_ahead: Option<usize>,
    pub output_buffer_limit: Option<usize>,
}

impl ShellOverrides {
    pub fn working_directory(&mut self, dir: impl Into<PathBuf>) -> &mut Self {
        self.working_directory = Some(dir.into());
        self
    }

    pub fn log_commands(&mut self, enabled: bool) -> &mut Self {
        self.log_commands = Some(enabled);
        self
    }

    pub fn default_stdout(&mut self, producer: SinkProducer) -> &mut Self {
        self.default_stdout = Some(producer);
        self
    }

    pub fn default_stderr(&mut self, producer: SinkProducer) -> &mut Self {
        self.default_stderr = Some(producer);
        self
    }

    pub fn exit_values(&mut self, codes: impl IntoIterator<Item = i32>) -> &mut Self {
        self.exit_values = Some(codes.into_iter().collect());
        self
    }

    pub fn executor(&mut self, executor: Arc<dyn Executor>) -> &mut Self {
        self.executor = Some(executor);
        self
    }

    /// Launch through `driver` instead of the OS.
    pub fn driver(&mut self, driver: Arc<dyn ProcessDriver>) -> &mut Self {
        self.driver = Some(driver);
        self
    }

    pub fn shutdown_handler(&mut self, handler: Arc<dyn ShutdownHandler>) -> &mut Self {
        self.shutdown_handler = Some(handler);
        self
    }

    pub fn stdin_read_ahead(&mut self, bytes: usize) -> &mut Self {
        self.stdin_read_ahead = Some(bytes);
        self
    }

    pub fn output_buffer_limit(&mut self, bytes: usize) -> &mut Self {
        self.output_buffer_limit = Some(bytes);
        self
    }
}

impl fmt::Debug for ShellOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShellOverrides")
            .field("working_directory", &self.working_directory)
            .field("log_commands", &self.log_commands)
            .field("default_stdout", &self.default_stdout.is_some())
            .field("default_stderr", &self.default_stderr.is_some())
            .field("exit_values", &self.exit_values)
            .field("executor", &self.executor.is_some())
            .field("driver", &self.driver.is_some())
            .field("shutdown_handler", &self.shutdown_handler.is_some())
            .field("stdin_read_ahead", &self.stdin_read_ahead)
            .field("output_buffer_limit", &self.output_buffer_limit)
            .finish()
    }
}
