use std::io::{self, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// An endless stream of `Q`s that counts how many bytes were taken from it.
///
/// Clones share the counter, so a test can keep one and hand the other to a
/// process as stdin.
#[derive(Debug, Clone, Default)]
pub struct CountingSource {
    read: Arc<AtomicU64>,
}

impl CountingSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total bytes read so far.
    pub fn bytes_read(&self) -> u64 {
        self.read.load(Ordering::SeqCst)
    }
}

impl Read for CountingSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        buf.fill(b'Q');
        self.read.fetch_add(buf.len() as u64, Ordering::SeqCst);
        Ok(buf.len())
    }
}
