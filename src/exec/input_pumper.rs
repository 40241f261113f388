// src/exec/input_pumper.rs

//! Input pumper: blocking application source → pull-style OS consumer.
//!
//! The stdin-ready callback must never block, but the application hands us a
//! blocking `Read`. A worker reads ahead into a buffer, up to a configured
//! limit, and `read()` gives the callback whatever is ready. Every pull
//! re-triggers the worker so the read-ahead window refills.

use std::io::{ErrorKind, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tracing::{debug, trace};

use crate::errors::{Result, ShellError};

use super::executor::Executor;
use super::pipe::{PipeBuffer, Popped};
use super::single_flight::SingleConcurrentExecution;

/// Default read-ahead window.
pub const DEFAULT_READ_AHEAD: usize = 128 * 1024;

const READ_CHUNK: usize = 8 * 1024;

type Notification = Box<dyn Fn() + Send + Sync>;

struct InputShared {
    source: Mutex<Option<Box<dyn Read + Send>>>,
    pipe: PipeBuffer,
    limit: usize,
    done_with_input: AtomicBool,
    closed_input: AtomicBool,
    done_with_output: AtomicBool,
    closed_output: AtomicBool,
    on_input_ready: Notification,
    on_input_done: Notification,
}

pub struct InputPumper {
    shared: Arc<InputShared>,
    pump: SingleConcurrentExecution,
}

impl std::fmt::Debug for InputPumper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputPumper")
            .field("buffered", &self.shared.pipe.used_bytes())
            .field("limit", &self.shared.limit)
            .field("done_with_input", &self.shared.done_with_input.load(Ordering::Relaxed))
            .field("done_with_output", &self.shared.done_with_output.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl InputPumper {
    /// `on_input_ready` fires after each chunk lands in the buffer;
    /// `on_input_done` fires once when the source is exhausted or closed.
    pub fn new<R, D>(
        executor: Arc<dyn Executor>,
        source: Box<dyn Read + Send>,
        limit: usize,
        on_input_ready: R,
        on_input_done: D,
    ) -> Self
    where
        R: Fn() + Send + Sync + 'static,
        D: Fn() + Send + Sync + 'static,
    {
        let shared = Arc::new(InputShared {
            source: Mutex::new(Some(source)),
            pipe: PipeBuffer::unbounded(),
            limit: limit.max(1),
            done_with_input: AtomicBool::new(false),
            closed_input: AtomicBool::new(false),
            done_with_output: AtomicBool::new(false),
            closed_output: AtomicBool::new(false),
            on_input_ready: Box::new(on_input_ready),
            on_input_done: Box::new(on_input_done),
        });

        let pump = {
            let shared = Arc::clone(&shared);
            SingleConcurrentExecution::new("input pumper", executor, move || shared.fill())
        };

        Self { shared, pump }
    }

    /// Begin reading ahead from the source.
    pub fn start_pump(&self) {
        self.pump.run();
    }

    /// Everything currently buffered (possibly nothing), or `None` once the
    /// source is exhausted and fully drained.
    pub fn read(&self) -> Result<Option<Bytes>> {
        if self.shared.done_with_output.load(Ordering::Acquire) {
            return Err(ShellError::InvalidState("cannot read after close"));
        }
        match self.shared.pipe.pop_all() {
            Popped::Finished => Ok(None),
            Popped::Empty => {
                self.pump.run();
                Ok(Some(Bytes::new()))
            }
            Popped::Data(bytes) => {
                trace!(bytes = bytes.len(), "read bytes");
                self.pump.run();
                Ok(Some(bytes))
            }
        }
    }

    /// Stop pumping, close the source and drop anything buffered.
    pub fn close(&self) {
        trace!("closing input pumper");
        self.shared.done_with_input.store(true, Ordering::Release);
        self.shared.done_with_output.store(true, Ordering::Release);
        self.pump.run();
    }

    pub fn buffered_bytes(&self) -> usize {
        self.shared.pipe.used_bytes()
    }

    /// Whether the source has been closed and released.
    pub fn is_input_closed(&self) -> bool {
        self.shared.closed_input.load(Ordering::Acquire)
    }

    /// Whether both sides have been closed and released.
    pub fn is_finished(&self) -> bool {
        self.shared.closed_input.load(Ordering::Acquire)
            && self.shared.closed_output.load(Ordering::Acquire)
    }
}

impl InputShared {
    fn fill(&self) -> anyhow::Result<()> {
        loop {
            if self.done_with_input.load(Ordering::Acquire) {
                if !self.closed_input.swap(true, Ordering::AcqRel) {
                    trace!("closing input");
                    self.source
                        .lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner())
                        .take();
                    self.pipe.close_write();
                    (self.on_input_done)();
                }
                if self.done_with_output.load(Ordering::Acquire)
                    && !self.closed_output.swap(true, Ordering::AcqRel)
                {
                    trace!("closing output");
                    self.pipe.clear();
                }
                return Ok(());
            }

            let remaining = self.limit.saturating_sub(self.pipe.used_bytes());
            if remaining == 0 {
                return Ok(());
            }

            let mut buf = vec![0u8; remaining.min(READ_CHUNK)];
            let read = {
                let mut source = self
                    .source
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                match source.as_mut() {
                    Some(source) => source.read(&mut buf),
                    None => Ok(0),
                }
            };

            match read {
                Ok(0) => {
                    debug!("stdin source exhausted");
                    self.done_with_input.store(true, Ordering::Release);
                }
                Ok(n) => {
                    buf.truncate(n);
                    trace!(bytes = n, "writing bytes");
                    self.pipe.push(Bytes::from(buf))?;
                    (self.on_input_ready)();
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    // Treat a failing source as exhausted so the child sees EOF.
                    self.done_with_input.store(true, Ordering::Release);
                    return Err(anyhow::Error::new(e).context("reading stdin source"));
                }
            }
        }
    }
}
