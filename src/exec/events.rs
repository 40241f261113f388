// src/exec/events.rs

//! Contract between the OS process layer and the pumping machinery.
//!
//! The OS layer (a [`ProcessDriver`]) owns the child process and reports
//! everything that happens to it as a [`ProcessEvent`] delivered to a
//! [`ProcessListener`]. Listeners must not block: they forward real work to
//! the pumpers' worker pool.

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::BytesMut;

/// Handle the OS layer gives listeners for steering a running child.
pub trait ProcessControl: Send + Sync {
    /// Ask for a `StdinReady` event once stdin can accept writes.
    /// A no-op once stdin has been closed.
    fn want_write(&self);

    /// Close the write side of the child's stdin after pending writes.
    fn close_stdin(&self);

    /// Terminate the child: SIGKILL when `force`, SIGTERM otherwise.
    /// A no-op once the child has exited.
    fn destroy(&self, force: bool);

    fn pid(&self) -> Option<u32>;
}

/// Everything the OS layer can tell a listener.
pub enum ProcessEvent<'a> {
    /// The child is running.
    Started(Arc<dyn ProcessControl>),
    /// Stdin is writable; fill at most the buffer's spare capacity.
    StdinReady(&'a mut BytesMut),
    StdoutData { data: &'a [u8], closed: bool },
    StderrData { data: &'a [u8], closed: bool },
    /// The child exited. Always the last event.
    Exited(i32),
}

impl fmt::Debug for ProcessEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessEvent::Started(control) => f
                .debug_tuple("Started")
                .field(&control.pid())
                .finish(),
            ProcessEvent::StdinReady(buf) => f
                .debug_struct("StdinReady")
                .field("spare", &(buf.capacity() - buf.len()))
                .finish(),
            ProcessEvent::StdoutData { data, closed } => f
                .debug_struct("StdoutData")
                .field("len", &data.len())
                .field("closed", closed)
                .finish(),
            ProcessEvent::StderrData { data, closed } => f
                .debug_struct("StderrData")
                .field("len", &data.len())
                .field("closed", closed)
                .finish(),
            ProcessEvent::Exited(code) => f.debug_tuple("Exited").field(code).finish(),
        }
    }
}

/// Receiver of [`ProcessEvent`]s.
pub trait ProcessListener: Send + Sync {
    /// Handle one event.
    ///
    /// The return value only matters for `StdinReady`: `true` means more data
    /// was written and the listener wants another `StdinReady` right away;
    /// `false` means wait for the next `want_write`.
    fn on_event(&self, event: ProcessEvent<'_>) -> bool;
}

/// Everything a driver needs to start a child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    /// Program followed by its arguments.
    pub argv: Vec<String>,
    pub working_directory: PathBuf,
    /// Full replacement environment, or `None` to inherit ours.
    pub environment: Option<BTreeMap<String, String>>,
    pub pipe_stdin: bool,
    pub pipe_stdout: bool,
    pub pipe_stderr: bool,
}

impl LaunchSpec {
    pub fn program(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or("")
    }
}

/// The OS process layer.
pub trait ProcessDriver: Send + Sync {
    /// Start a child and deliver its events to `listener`.
    ///
    /// On success the listener has already received (or will receive first)
    /// `Started`. On failure no event is ever delivered.
    fn launch(
        &self,
        spec: LaunchSpec,
        listener: Arc<dyn ProcessListener>,
    ) -> io::Result<Arc<dyn ProcessControl>>;
}
