// src/io/sink.rs

//! Application-facing byte sinks.
//!
//! `std::io::Write` has no notion of "close", but the output pumpers must tell
//! the application exactly once that a stream has ended. [`ByteSink`] adds that
//! to a minimal write API.

use std::io::{self, Write};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use tracing::trace;

/// Destination for bytes produced by a child process.
pub trait ByteSink: Send {
    /// Write all of `data`.
    fn write(&mut self, data: &[u8]) -> io::Result<()>;

    /// Signal end of stream. Called at most once by the pumpers.
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<S: ByteSink + ?Sized> ByteSink for Box<S> {
    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        (**self).write(data)
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

/// Adapts any `Write`; closing flushes and drops the writer.
pub struct WriterSink<W: Write + Send> {
    writer: Option<W>,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Some(writer),
        }
    }
}

impl<W: Write + Send> ByteSink for WriterSink<W> {
    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        match self.writer.as_mut() {
            Some(w) => w.write_all(data),
            None => Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink closed")),
        }
    }

    fn close(&mut self) -> io::Result<()> {
        match self.writer.take() {
            Some(mut w) => w.flush(),
            None => Ok(()),
        }
    }
}

/// Adapts a `Write` that must outlive the process, such as our own stdout;
/// closing only flushes.
pub struct NoCloseSink<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> NoCloseSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write + Send> ByteSink for NoCloseSink<W> {
    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.writer.write_all(data)
    }

    fn close(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Box a `Write` as a closing sink.
pub fn sink_from_writer<W: Write + Send + 'static>(writer: W) -> Box<dyn ByteSink> {
    Box::new(WriterSink::new(writer))
}

#[derive(Debug, Default)]
struct Collected {
    bytes: Vec<u8>,
    open_sinks: usize,
}

/// Shared in-memory buffer fed by any number of [`CollectSink`]s.
///
/// Reading blocks until every sink handed out so far has been closed.
#[derive(Debug, Clone, Default)]
pub struct CollectedOutput {
    shared: Arc<(Mutex<Collected>, Condvar)>,
}

impl CollectedOutput {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Collected> {
        self.shared
            .0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Hand out a sink writing into this buffer.
    pub fn sink(&self) -> CollectSink {
        self.lock().open_sinks += 1;
        CollectSink {
            output: self.clone(),
            closed: false,
        }
    }

    /// Wait for all sinks to close, then return a copy of the bytes.
    pub fn bytes(&self) -> Vec<u8> {
        let (_, cond) = &*self.shared;
        let mut state = self.lock();
        while state.open_sinks > 0 {
            state = cond
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        state.bytes.clone()
    }

    /// As [`Self::bytes`], decoded lossily as UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes()).into_owned()
    }

    /// Whatever has been collected so far, without waiting.
    pub fn snapshot(&self) -> Vec<u8> {
        self.lock().bytes.clone()
    }

    pub fn is_complete(&self) -> bool {
        self.lock().open_sinks == 0
    }
}

/// Sink half of a [`CollectedOutput`].
#[derive(Debug)]
pub struct CollectSink {
    output: CollectedOutput,
    closed: bool,
}

impl CollectSink {
    fn finish(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let mut state = self.output.lock();
        state.open_sinks -= 1;
        trace!(open_sinks = state.open_sinks, "collect sink closed");
        drop(state);
        self.output.shared.1.notify_all();
    }
}

impl ByteSink for CollectSink {
    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.output.lock().bytes.extend_from_slice(data);
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.finish();
        Ok(())
    }
}

impl Drop for CollectSink {
    fn drop(&mut self) {
        // A sink dropped without close (e.g. launch failure) still counts as done.
        self.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn writer_sink_rejects_writes_after_close() {
        let mut sink = WriterSink::new(Vec::new());
        sink.write(b"abc").unwrap();
        sink.close().unwrap();
        assert_eq!(
            sink.write(b"x").unwrap_err().kind(),
            io::ErrorKind::BrokenPipe
        );
    }

    #[test]
    fn collected_output_waits_for_all_sinks() {
        let output = CollectedOutput::new();
        let mut a = output.sink();
        let mut b = output.sink();

        a.write(b"one ").unwrap();
        a.close().unwrap();
        assert!(!output.is_complete());

        let reader = {
            let output = output.clone();
            thread::spawn(move || output.text())
        };
        thread::sleep(Duration::from_millis(20));
        b.write(b"two").unwrap();
        b.close().unwrap();

        assert_eq!(reader.join().unwrap(), "one two");
    }

    #[test]
    fn dropped_collect_sink_counts_as_closed() {
        let output = CollectedOutput::new();
        drop(output.sink());
        assert!(output.is_complete());
        assert!(output.bytes().is_empty());
    }
}
