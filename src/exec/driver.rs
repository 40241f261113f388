// src/exec/driver.rs

//! Tokio-based OS process layer.
//!
//! Spawns children with `tokio::process::Command` and turns their stdio into
//! [`ProcessEvent`]s. Each stream is an async task on the runtime rather than a
//! dedicated OS thread:
//!
//! - stdout/stderr readers dispatch `StdoutData`/`StderrData` per read and a
//!   final `closed = true`.
//! - the stdin writer sleeps until `want_write`, then asks the listener to fill
//!   a buffer via `StdinReady` and writes it.
//! - the exit task waits for both readers and the child, then dispatches
//!   `Exited`, which is always the last event.

use std::io;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::BytesMut;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{ChildStdin, Command};
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::Notify;
use tracing::{debug, trace, warn};

use super::events::{LaunchSpec, ProcessControl, ProcessDriver, ProcessEvent, ProcessListener};

/// Size of each read from stdout/stderr and of each stdin buffer.
pub const DEFAULT_IO_BUFFER: usize = 64 * 1024;

/// [`ProcessDriver`] running on a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioDriver {
    handle: Handle,
    io_buffer: usize,
}

impl TokioDriver {
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            io_buffer: DEFAULT_IO_BUFFER,
        }
    }

    pub fn with_io_buffer(mut self, bytes: usize) -> Self {
        self.io_buffer = bytes.max(1);
        self
    }
}

struct TokioControl {
    pid: Option<u32>,
    wake_stdin: Notify,
    stdin_closed: AtomicBool,
    exited: AtomicBool,
}

impl TokioControl {
    fn new(pid: Option<u32>) -> Self {
        Self {
            pid,
            wake_stdin: Notify::new(),
            stdin_closed: AtomicBool::new(false),
            exited: AtomicBool::new(false),
        }
    }

    fn is_stdin_closed(&self) -> bool {
        self.stdin_closed.load(Ordering::Acquire)
    }
}

impl ProcessControl for TokioControl {
    fn want_write(&self) {
        if !self.is_stdin_closed() {
            self.wake_stdin.notify_one();
        }
    }

    fn close_stdin(&self) {
        self.stdin_closed.store(true, Ordering::Release);
        self.wake_stdin.notify_one();
    }

    fn destroy(&self, force: bool) {
        if self.exited.load(Ordering::Acquire) {
            return;
        }
        let Some(pid) = self.pid else {
            return;
        };
        let signal = if force { Signal::SIGKILL } else { Signal::SIGTERM };
        debug!(pid, ?signal, "destroying process");
        if let Err(errno) = kill(Pid::from_raw(pid as i32), signal) {
            debug!(pid, error = %errno, "failed to signal process");
        }
    }

    fn pid(&self) -> Option<u32> {
        self.pid
    }
}

impl ProcessDriver for TokioDriver {
    fn launch(
        &self,
        spec: LaunchSpec,
        listener: Arc<dyn ProcessListener>,
    ) -> io::Result<Arc<dyn ProcessControl>> {
        let Some((program, args)) = spec.argv.split_first() else {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty command"));
        };

        // Child reaping and pipe registration need the runtime context.
        let _guard = self.handle.enter();

        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(&spec.working_directory)
            .stdin(piped_or_null(spec.pipe_stdin))
            .stdout(piped_or_null(spec.pipe_stdout))
            .stderr(piped_or_null(spec.pipe_stderr))
            .kill_on_drop(true);
        if let Some(env) = &spec.environment {
            cmd.env_clear().envs(env);
        }

        let mut child = cmd.spawn()?;
        let control = Arc::new(TokioControl::new(child.id()));
        trace!(pid = ?control.pid, program = %program, "spawned child");

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        listener.on_event(ProcessEvent::Started(control.clone()));

        let stdin_task = stdin.map(|stdin| {
            self.handle.spawn(pump_stdin(
                stdin,
                Arc::clone(&listener),
                Arc::clone(&control),
                self.io_buffer,
            ))
        });
        let stdout_task = stdout.map(|out| {
            self.handle.spawn(pump_output(
                out,
                Arc::clone(&listener),
                Stream::Stdout,
                self.io_buffer,
            ))
        });
        let stderr_task = stderr.map(|err| {
            self.handle.spawn(pump_output(
                err,
                Arc::clone(&listener),
                Stream::Stderr,
                self.io_buffer,
            ))
        });

        let exit_control = Arc::clone(&control);
        self.handle.spawn(async move {
            for task in [stdout_task, stderr_task].into_iter().flatten() {
                if let Err(e) = task.await {
                    warn!(error = %e, "output reader task failed");
                }
            }

            let code = match child.wait().await {
                Ok(status) => status.code().unwrap_or(-1),
                Err(e) => {
                    warn!(pid = ?exit_control.pid, error = %e, "waiting for child failed");
                    -1
                }
            };
            exit_control.exited.store(true, Ordering::Release);
            exit_control.stdin_closed.store(true, Ordering::Release);
            if let Some(task) = stdin_task {
                task.abort();
            }

            trace!(pid = ?exit_control.pid, exit_code = code, "child reaped");
            dispatch_blocking(|| listener.on_event(ProcessEvent::Exited(code)));
        });

        Ok(control)
    }
}

fn piped_or_null(piped: bool) -> Stdio {
    if piped { Stdio::piped() } else { Stdio::null() }
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

impl Stream {
    fn event(self, data: &[u8], closed: bool) -> ProcessEvent<'_> {
        match self {
            Stream::Stdout => ProcessEvent::StdoutData { data, closed },
            Stream::Stderr => ProcessEvent::StderrData { data, closed },
        }
    }
}

async fn pump_output<R>(
    mut reader: R,
    listener: Arc<dyn ProcessListener>,
    stream: Stream,
    size: usize,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; size];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                dispatch_blocking(|| listener.on_event(stream.event(&buf[..n], false)));
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                debug!(?stream, error = %e, "read from child failed; treating as closed");
                break;
            }
        }
    }
    dispatch_blocking(|| listener.on_event(stream.event(&[], true)));
}

async fn pump_stdin(
    mut stdin: ChildStdin,
    listener: Arc<dyn ProcessListener>,
    control: Arc<TokioControl>,
    size: usize,
) {
    'outer: loop {
        control.wake_stdin.notified().await;
        loop {
            if control.is_stdin_closed() {
                break 'outer;
            }
            let mut buf = BytesMut::with_capacity(size);
            let more = listener.on_event(ProcessEvent::StdinReady(&mut buf));
            if !buf.is_empty() {
                if let Err(e) = stdin.write_all(&buf).await {
                    // Usually EPIPE: the child exited or closed its stdin.
                    debug!(pid = ?control.pid, error = %e, "write to stdin failed");
                    control.stdin_closed.store(true, Ordering::Release);
                    break 'outer;
                }
            }
            if control.is_stdin_closed() {
                break 'outer;
            }
            if !more {
                break;
            }
        }
    }

    if let Err(e) = stdin.shutdown().await {
        trace!(error = %e, "closing stdin failed");
    }
    trace!(pid = ?control.pid, "stdin closed");
}

/// Run a listener callback that may block (a full output pumper) without
/// starving the runtime's other tasks.
fn dispatch_blocking<R>(f: impl FnOnce() -> R) -> R {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}
