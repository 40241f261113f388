use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use procpump::exec::ProcessControl;
use procpump::io::ByteSink;

/// A [`ProcessControl`] that:
/// - counts `want_write` calls
/// - records whether stdin was closed
/// - counts `destroy` calls and remembers the last `force` flag
#[derive(Debug, Default)]
pub struct FakeControl {
    pub pid: Option<u32>,
    want_writes: AtomicUsize,
    stdin_closed: AtomicBool,
    destroys: AtomicUsize,
    last_force: AtomicBool,
}

impl FakeControl {
    pub fn with_pid(pid: u32) -> Arc<Self> {
        Arc::new(Self {
            pid: Some(pid),
            ..Self::default()
        })
    }

    pub fn want_writes(&self) -> usize {
        self.want_writes.load(Ordering::SeqCst)
    }

    pub fn stdin_closed(&self) -> bool {
        self.stdin_closed.load(Ordering::SeqCst)
    }

    pub fn destroys(&self) -> usize {
        self.destroys.load(Ordering::SeqCst)
    }

    pub fn last_force(&self) -> bool {
        self.last_force.load(Ordering::SeqCst)
    }
}

impl ProcessControl for FakeControl {
    fn want_write(&self) {
        self.want_writes.fetch_add(1, Ordering::SeqCst);
    }

    fn close_stdin(&self) {
        self.stdin_closed.store(true, Ordering::SeqCst);
    }

    fn destroy(&self, force: bool) {
        self.last_force.store(force, Ordering::SeqCst);
        self.destroys.fetch_add(1, Ordering::SeqCst);
    }

    fn pid(&self) -> Option<u32> {
        self.pid
    }
}

/// A [`ByteSink`] whose clones share one record of writes and closes.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    bytes: Arc<Mutex<Vec<u8>>>,
    writes: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.bytes.lock().unwrap().clone()
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl ByteSink for RecordingSink {
    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.bytes.lock().unwrap().extend_from_slice(data);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
