// src/exec/process.rs

//! Launching processes and the caller-facing process handle.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, info};

use crate::errors::{Result, ShellError};
use crate::shell::{ProcessConfiguration, ShellContext};

use super::events::{LaunchSpec, ProcessControl, ProcessListener};
use super::exit::ExitFuture;
use super::handler::{ProcessEventHandler, PumpLimits};

/// Crate-unique process identity. Unlike a pid it is never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessId(u64);

impl ProcessId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ProcessId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for ProcessId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Non-owning reference handed to a shutdown handler.
#[derive(Clone)]
pub struct ProcessRef {
    pub id: ProcessId,
    pub control: Arc<dyn ProcessControl>,
}

impl std::fmt::Debug for ProcessRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessRef")
            .field("id", &self.id)
            .field("pid", &self.control.pid())
            .finish()
    }
}

/// A launched (or failed-to-launch) child process.
#[derive(Debug)]
pub struct ShellProcess {
    id: ProcessId,
    program: String,
    handler: Arc<ProcessEventHandler>,
    acceptable_exit_codes: Vec<i32>,
}

impl ShellProcess {
    pub fn id(&self) -> ProcessId {
        self.id
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn exit_code(&self) -> &ExitFuture {
        self.handler.exit_code()
    }

    pub fn acceptable_exit_codes(&self) -> &[i32] {
        &self.acceptable_exit_codes
    }

    /// Wait for the process to finish. Fails with
    /// [`ShellError::InvalidExitCode`] if the exit code is not acceptable.
    pub fn wait_for(&self) -> Result<i32> {
        let code = self.exit_code().wait()?;
        self.check(code)
    }

    /// Async counterpart of [`Self::wait_for`].
    pub async fn wait_for_async(&self) -> Result<i32> {
        let code = self.exit_code().resolved().await?;
        self.check(code)
    }

    /// Wait until the process has exited and its output sinks are closed.
    pub async fn output_drained(&self) {
        self.handler.output_drained().await;
    }

    /// Whether the process exited with an acceptable code. Blocks until it exits.
    pub fn successful(&self) -> Result<bool> {
        let code = self.exit_code().wait()?;
        Ok(self.acceptable_exit_codes.contains(&code))
    }

    fn check(&self, code: i32) -> Result<i32> {
        if self.acceptable_exit_codes.contains(&code) {
            Ok(code)
        } else {
            Err(ShellError::InvalidExitCode { code })
        }
    }

    /// Terminate the process. Safe to call at any time, any number of times.
    pub fn destroy(&self, force: bool) {
        if let Some(control) = self.handler.control() {
            control.destroy(force);
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.handler.pid()
    }

    /// Reference for a shutdown handler; `None` if the launch failed.
    pub fn tracking_ref(&self) -> Option<ProcessRef> {
        self.handler.control().map(|control| ProcessRef {
            id: self.id,
            control: Arc::clone(control),
        })
    }
}

/// Launch a process described by `config` within `ctx`.
///
/// Never fails directly: a launch failure resolves the exit future with an
/// error instead, which `wait_for` reports as [`ShellError::Launch`].
pub fn start(mut config: ProcessConfiguration, ctx: &ShellContext) -> ShellProcess {
    if ctx.log_commands {
        info!("{}", config.render(ctx));
    }

    let stdout = config.take_stdout(ctx);
    let stderr = config.take_stderr(ctx);
    let stdin = config.stdin.take();

    let handler = Arc::new(ProcessEventHandler::new(
        Arc::clone(&ctx.executor),
        PumpLimits {
            stdin_read_ahead: ctx.stdin_read_ahead,
            output_buffer_limit: ctx.output_buffer_limit,
        },
        stdin,
        stdout,
        stderr,
    ));

    let spec = LaunchSpec {
        argv: config.arguments.clone(),
        working_directory: config
            .working_directory
            .clone()
            .unwrap_or_else(|| ctx.working_directory.clone()),
        environment: config.environment.clone(),
        pipe_stdin: handler.has_stdin(),
        pipe_stdout: handler.has_stdout(),
        pipe_stderr: handler.has_stderr(),
    };
    let program = spec.program().to_string();

    let process = ShellProcess {
        id: ProcessId::next(),
        program: program.clone(),
        handler: Arc::clone(&handler),
        acceptable_exit_codes: config.exit_values.clone(),
    };

    let listener: Arc<dyn ProcessListener> = handler.clone();
    match ctx.driver.launch(spec, listener) {
        Ok(control) => {
            debug!(id = %process.id, pid = ?control.pid(), program = %program, "launched process");
            if config.register_for_shutdown {
                register(&process, ctx);
            }
        }
        Err(error) => handler.launch_failed(&program, error),
    }
    process
}

fn register(process: &ShellProcess, ctx: &ShellContext) {
    let Some(tracked) = process.tracking_ref() else {
        return;
    };
    let id = tracked.id;
    ctx.shutdown_handler.add(tracked);

    // Registered after add so removal can never precede it.
    let shutdown = Arc::clone(&ctx.shutdown_handler);
    process.exit_code().on_complete(move |_| shutdown.remove(id));
}
