// src/exec/output_pumper.rs

//! Output pumper: push-style OS data → application sink.
//!
//! The OS layer hands us stdout/stderr bytes from a readiness callback with no
//! flow control of its own. We buffer generously and only occupy a worker
//! thread while there is something to write; the sink is closed exactly once
//! after the input is exhausted and the buffer drained.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::sync::Notify;
use tracing::{trace, warn};

use crate::errors::{Result, ShellError};
use crate::io::ByteSink;

use super::executor::Executor;
use super::pipe::{PipeBuffer, Popped};
use super::single_flight::SingleConcurrentExecution;

/// Default bound on bytes buffered ahead of the sink.
pub const DEFAULT_OUTPUT_LIMIT: usize = 20 * 1024 * 1024;

const DRAIN_CHUNK: usize = 64 * 1024;

struct OutputShared {
    pipe: PipeBuffer,
    sink: Mutex<Box<dyn ByteSink>>,
    /// Claimed by whichever drain pass closes the sink.
    closing: AtomicBool,
    /// Set once the sink's `close` has returned.
    finished: AtomicBool,
    finished_notify: Notify,
}

pub struct OutputPumper {
    shared: Arc<OutputShared>,
    pump: SingleConcurrentExecution,
}

impl std::fmt::Debug for OutputPumper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputPumper")
            .field("buffered", &self.shared.pipe.used_bytes())
            .field("done", &self.shared.pipe.is_write_closed())
            .finish_non_exhaustive()
    }
}

impl OutputPumper {
    pub fn new(executor: Arc<dyn Executor>, sink: Box<dyn ByteSink>, limit: usize) -> Self {
        let shared = Arc::new(OutputShared {
            pipe: PipeBuffer::bounded(limit),
            sink: Mutex::new(sink),
            closing: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            finished_notify: Notify::new(),
        });

        let pump = {
            let shared = Arc::clone(&shared);
            SingleConcurrentExecution::new("output pumper", executor, move || shared.drain())
        };

        Self { shared, pump }
    }

    /// Buffer `data` for the sink. Blocks while the buffer limit is reached.
    pub fn write(&self, data: &[u8]) -> Result<()> {
        if self.shared.pipe.is_write_closed() {
            return Err(ShellError::InvalidState("pumper was closed"));
        }
        self.shared.pipe.push(Bytes::copy_from_slice(data))?;
        trace!(bytes = data.len(), "received bytes");
        self.pump.run();
        Ok(())
    }

    /// No more input will arrive; drain what is buffered, then close the sink.
    pub fn close(&self) {
        trace!("output pumper closed");
        self.shared.pipe.close_write();
        self.pump.run();
    }

    pub fn buffered_bytes(&self) -> usize {
        self.shared.pipe.used_bytes()
    }

    /// Whether the sink has been closed.
    pub fn is_finished(&self) -> bool {
        self.shared.finished.load(Ordering::Acquire)
    }

    /// Wait until the sink has been closed.
    pub async fn finished(&self) {
        loop {
            let notified = self.shared.finished_notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_finished() {
                return;
            }
            notified.await;
        }
    }
}

impl OutputShared {
    fn drain(&self) -> anyhow::Result<()> {
        let mut sink = self
            .sink
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        loop {
            match self.pipe.pop_up_to(DRAIN_CHUNK) {
                Popped::Data(chunk) => match sink.write(&chunk) {
                    Ok(()) => trace!(bytes = chunk.len(), "wrote bytes"),
                    // The chunk is lost; the rest still has to reach close.
                    Err(err) => warn!(bytes = chunk.len(), error = %err, "dropping output chunk"),
                },
                Popped::Empty => return Ok(()),
                Popped::Finished => {
                    if self.closing.swap(true, Ordering::AcqRel) {
                        return Ok(());
                    }
                    trace!("closing output");
                    let closed = sink.close();
                    self.finished.store(true, Ordering::Release);
                    self.finished_notify.notify_waiters();
                    closed?;
                    return Ok(());
                }
            }
        }
    }
}
