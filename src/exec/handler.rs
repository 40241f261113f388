// src/exec/handler.rs

//! Process event handler.
//!
//! Bridges the OS layer's events to the pumpers. Lifecycle:
//! `Created → Started → Running → Exited`. Output data is forwarded to the
//! matching [`OutputPumper`], stdin readiness pulls from the [`InputPumper`],
//! and the exit event closes every pumper before resolving the exit future.

use std::io::Read;
use std::sync::{Arc, Mutex, OnceLock};

use bytes::{Bytes, BytesMut};
use tracing::{debug, trace, warn};

use crate::io::ByteSink;

use super::events::{ProcessControl, ProcessEvent, ProcessListener};
use super::executor::Executor;
use super::exit::ExitFuture;
use super::input_pumper::{DEFAULT_READ_AHEAD, InputPumper};
use super::output_pumper::{DEFAULT_OUTPUT_LIMIT, OutputPumper};

/// Pumper sizing for one process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpLimits {
    pub stdin_read_ahead: usize,
    pub output_buffer_limit: usize,
}

impl Default for PumpLimits {
    fn default() -> Self {
        Self {
            stdin_read_ahead: DEFAULT_READ_AHEAD,
            output_buffer_limit: DEFAULT_OUTPUT_LIMIT,
        }
    }
}

type ControlSlot = Arc<OnceLock<Arc<dyn ProcessControl>>>;

pub struct ProcessEventHandler {
    control: ControlSlot,
    in_pumper: Option<InputPumper>,
    out_pumper: Option<OutputPumper>,
    err_pumper: Option<OutputPumper>,
    /// Bytes pulled from the input pumper that did not fit the last stdin buffer.
    waiting_input: Mutex<Option<Bytes>>,
    exit_code: ExitFuture,
}

impl std::fmt::Debug for ProcessEventHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessEventHandler")
            .field("pid", &self.pid())
            .field("stdin", &self.in_pumper)
            .field("stdout", &self.out_pumper)
            .field("stderr", &self.err_pumper)
            .field("exit_code", &self.exit_code)
            .finish()
    }
}

impl ProcessEventHandler {
    pub fn new(
        executor: Arc<dyn Executor>,
        limits: PumpLimits,
        stdin: Option<Box<dyn Read + Send>>,
        stdout: Option<Box<dyn ByteSink>>,
        stderr: Option<Box<dyn ByteSink>>,
    ) -> Self {
        let control: ControlSlot = Arc::new(OnceLock::new());

        let in_pumper = stdin.map(|source| {
            let on_ready = Arc::clone(&control);
            let on_done = Arc::clone(&control);
            InputPumper::new(
                Arc::clone(&executor),
                source,
                limits.stdin_read_ahead,
                move || want_write_if_possible(&on_ready),
                move || want_write_if_possible(&on_done),
            )
        });
        let out_pumper = stdout.map(|sink| {
            OutputPumper::new(Arc::clone(&executor), sink, limits.output_buffer_limit)
        });
        let err_pumper = stderr.map(|sink| {
            OutputPumper::new(Arc::clone(&executor), sink, limits.output_buffer_limit)
        });

        Self {
            control,
            in_pumper,
            out_pumper,
            err_pumper,
            waiting_input: Mutex::new(None),
            exit_code: ExitFuture::new(executor),
        }
    }

    pub fn has_stdin(&self) -> bool {
        self.in_pumper.is_some()
    }

    pub fn has_stdout(&self) -> bool {
        self.out_pumper.is_some()
    }

    pub fn has_stderr(&self) -> bool {
        self.err_pumper.is_some()
    }

    pub fn exit_code(&self) -> &ExitFuture {
        &self.exit_code
    }

    /// The control handle, once the process has started.
    pub fn control(&self) -> Option<&Arc<dyn ProcessControl>> {
        self.control.get()
    }

    pub fn pid(&self) -> Option<u32> {
        self.control().and_then(|c| c.pid())
    }

    /// Whether every output sink has been closed.
    pub fn is_output_drained(&self) -> bool {
        [&self.out_pumper, &self.err_pumper]
            .into_iter()
            .flatten()
            .all(OutputPumper::is_finished)
    }

    /// Wait until every output sink has been closed.
    pub async fn output_drained(&self) {
        for pumper in [&self.out_pumper, &self.err_pumper].into_iter().flatten() {
            pumper.finished().await;
        }
    }

    /// The OS layer could not start the process. Stdin is never read; the
    /// output sinks are closed empty so collectors do not wait forever.
    pub fn launch_failed(&self, program: &str, error: std::io::Error) {
        warn!(program, error = %error, "failed to launch process");
        for pumper in [&self.out_pumper, &self.err_pumper].into_iter().flatten() {
            pumper.close();
        }
        self.exit_code.fail(program, error);
    }

    fn on_start(&self, control: Arc<dyn ProcessControl>) {
        trace!(pid = ?control.pid(), "start");
        if self.control.set(control).is_err() {
            warn!("process reported start twice; ignoring");
            return;
        }
        if let Some(pumper) = &self.in_pumper {
            want_write_if_possible(&self.control);
            pumper.start_pump();
        }
    }

    fn on_stdin_ready(&self, buffer: &mut BytesMut) -> bool {
        let Some(pumper) = &self.in_pumper else {
            return false;
        };

        let mut waiting = self
            .waiting_input
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let next = match waiting.take() {
            Some(bytes) => Some(bytes),
            None => pumper.read().unwrap_or_else(|err| {
                trace!(error = %err, "input pumper already closed");
                None
            }),
        };

        match next {
            None => {
                trace!("closing stdin");
                if let Some(control) = self.control() {
                    control.close_stdin();
                }
                false
            }
            Some(bytes) if bytes.is_empty() => {
                trace!("input not ready");
                false
            }
            Some(mut bytes) => {
                let spare = buffer.capacity() - buffer.len();
                let take = spare.min(bytes.len());
                buffer.extend_from_slice(&bytes.split_to(take));
                if !bytes.is_empty() {
                    *waiting = Some(bytes);
                }
                trace!(bytes = take, "write to stdin");
                true
            }
        }
    }

    fn on_output(
        &self,
        pumper: Option<&OutputPumper>,
        stream: &'static str,
        data: &[u8],
        closed: bool,
    ) {
        trace!(stream, bytes = data.len(), closed, "output received");
        let Some(pumper) = pumper else {
            return;
        };
        if !data.is_empty() {
            if let Err(err) = pumper.write(data) {
                debug!(stream, error = %err, "dropping output after close");
            }
        }
        if closed {
            pumper.close();
        }
    }

    fn on_exit(&self, code: i32) {
        debug!(pid = ?self.pid(), exit_code = code, "process exited");
        if let Some(p) = &self.in_pumper {
            p.close();
        }
        if let Some(p) = &self.out_pumper {
            p.close();
        }
        if let Some(p) = &self.err_pumper {
            p.close();
        }
        self.exit_code.complete(code);
    }
}

impl ProcessListener for ProcessEventHandler {
    fn on_event(&self, event: ProcessEvent<'_>) -> bool {
        match event {
            ProcessEvent::Started(control) => {
                self.on_start(control);
                false
            }
            ProcessEvent::StdinReady(buffer) => self.on_stdin_ready(buffer),
            ProcessEvent::StdoutData { data, closed } => {
                self.on_output(self.out_pumper.as_ref(), "stdout", data, closed);
                false
            }
            ProcessEvent::StderrData { data, closed } => {
                self.on_output(self.err_pumper.as_ref(), "stderr", data, closed);
                false
            }
            ProcessEvent::Exited(code) => {
                self.on_exit(code);
                false
            }
        }
    }
}

fn want_write_if_possible(control: &ControlSlot) {
    // Before start there is no one to ask; start() requests a write itself.
    if let Some(control) = control.get() {
        control.want_write();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::CollectedOutput;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::thread;
    use std::time::{Duration, Instant};

    #[derive(Default)]
    struct StubControl {
        want_writes: AtomicUsize,
        stdin_closed: AtomicBool,
    }

    impl ProcessControl for StubControl {
        fn want_write(&self) {
            self.want_writes.fetch_add(1, Ordering::SeqCst);
        }
        fn close_stdin(&self) {
            self.stdin_closed.store(true, Ordering::SeqCst);
        }
        fn destroy(&self, _force: bool) {}
        fn pid(&self) -> Option<u32> {
            Some(4242)
        }
    }

    fn wait_until(mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !cond() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn stdin_is_served_in_buffer_sized_pieces_then_closed() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let data: Vec<u8> = (0..1000u32).map(|i| i as u8).collect();
        let handler = ProcessEventHandler::new(
            Arc::new(rt.handle().clone()),
            PumpLimits::default(),
            Some(Box::new(Cursor::new(data.clone()))),
            None,
            None,
        );
        let control = Arc::new(StubControl::default());
        handler.on_event(ProcessEvent::Started(control.clone()));
        assert!(control.want_writes.load(Ordering::SeqCst) >= 1);

        let mut written = Vec::new();
        let deadline = Instant::now() + Duration::from_secs(10);
        while !control.stdin_closed.load(Ordering::SeqCst) {
            assert!(Instant::now() < deadline);
            let mut buf = BytesMut::with_capacity(64);
            if handler.on_event(ProcessEvent::StdinReady(&mut buf)) {
                assert!(buf.len() <= 64);
                written.extend_from_slice(&buf);
            } else {
                thread::sleep(Duration::from_millis(1));
            }
        }
        assert_eq!(written, data);
    }

    #[test]
    fn output_flows_to_sinks_and_exit_resolves() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let out = CollectedOutput::new();
        let err = CollectedOutput::new();
        let handler = ProcessEventHandler::new(
            Arc::new(rt.handle().clone()),
            PumpLimits::default(),
            None,
            Some(Box::new(out.sink())),
            Some(Box::new(err.sink())),
        );
        handler.on_event(ProcessEvent::Started(Arc::new(StubControl::default())));
        assert_eq!(handler.pid(), Some(4242));

        handler.on_event(ProcessEvent::StdoutData { data: b"hello ", closed: false });
        handler.on_event(ProcessEvent::StderrData { data: b"oops", closed: true });
        handler.on_event(ProcessEvent::StdoutData { data: b"world", closed: false });
        handler.on_event(ProcessEvent::Exited(3));
        // Late data and a second exit are harmless.
        handler.on_event(ProcessEvent::StdoutData { data: b"late", closed: true });
        handler.on_event(ProcessEvent::Exited(9));

        assert_eq!(handler.exit_code().wait().unwrap(), 3);
        rt.block_on(async {
            tokio::time::timeout(Duration::from_secs(10), handler.output_drained())
                .await
                .unwrap();
        });
        assert!(handler.is_output_drained());
        wait_until(|| out.is_complete() && err.is_complete());
        assert_eq!(out.text(), "hello world");
        assert_eq!(err.text(), "oops");
    }

    #[test]
    fn launch_failure_resolves_exceptionally_without_pumping() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let handler = ProcessEventHandler::new(
            Arc::new(rt.handle().clone()),
            PumpLimits::default(),
            Some(Box::new(Cursor::new(b"never read".to_vec()))),
            None,
            None,
        );
        handler.launch_failed("ghost", std::io::Error::from(std::io::ErrorKind::NotFound));
        assert!(handler.exit_code().wait().is_err());
        assert!(handler.control().is_none());
        assert_eq!(handler.in_pumper.as_ref().unwrap().buffered_bytes(), 0);
    }
}
