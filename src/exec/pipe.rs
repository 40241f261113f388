// src/exec/pipe.rs

//! In-memory byte queue shared by the pumpers.
//!
//! The queue itself is unbounded; `used_bytes()` is the backpressure signal.
//! An optional logical limit makes `push` block once that many bytes are
//! resident, which is how the output side bounds memory when the OS layer
//! offers no flow control of its own.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};

use bytes::{Bytes, BytesMut};

use crate::errors::{Result, ShellError};

/// Result of a non-blocking pop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Popped {
    /// Some buffered bytes, in FIFO order.
    Data(Bytes),
    /// Nothing buffered right now, but more may come.
    Empty,
    /// The write side is closed and everything has been consumed.
    Finished,
}

#[derive(Debug, Default)]
struct PipeState {
    chunks: VecDeque<Bytes>,
    len: usize,
    write_closed: bool,
}

#[derive(Debug)]
pub struct PipeBuffer {
    state: Mutex<PipeState>,
    space: Condvar,
    used: AtomicUsize,
    limit: Option<usize>,
}

impl Default for PipeBuffer {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl PipeBuffer {
    pub fn unbounded() -> Self {
        Self::with_limit(None)
    }

    /// A pipe whose `push` blocks while `limit` or more bytes are resident.
    pub fn bounded(limit: usize) -> Self {
        Self::with_limit(Some(limit.max(1)))
    }

    fn with_limit(limit: Option<usize>) -> Self {
        Self {
            state: Mutex::new(PipeState::default()),
            space: Condvar::new(),
            used: AtomicUsize::new(0),
            limit,
        }
    }

    fn lock(&self) -> MutexGuard<'_, PipeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Bytes pushed but not yet popped.
    pub fn used_bytes(&self) -> usize {
        self.used.load(Ordering::Acquire)
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Append `bytes`, blocking while the logical limit is reached.
    pub fn push(&self, bytes: Bytes) -> Result<()> {
        let mut state = self.lock();
        if let Some(limit) = self.limit {
            while state.len >= limit && !state.write_closed {
                state = self
                    .space
                    .wait(state)
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
            }
        }
        if state.write_closed {
            return Err(ShellError::InvalidState("pipe was closed for writing"));
        }
        if bytes.is_empty() {
            return Ok(());
        }
        state.len += bytes.len();
        self.used.fetch_add(bytes.len(), Ordering::AcqRel);
        state.chunks.push_back(bytes);
        Ok(())
    }

    /// Take up to `max` buffered bytes without blocking.
    pub fn pop_up_to(&self, max: usize) -> Popped {
        let mut state = self.lock();
        if state.len == 0 || max == 0 {
            return if state.write_closed && state.len == 0 {
                Popped::Finished
            } else {
                Popped::Empty
            };
        }

        let want = max.min(state.len);
        let out = if state.chunks.front().is_some_and(|c| c.len() >= want) {
            // Common case: served from the first chunk without copying.
            let mut front = state.chunks.pop_front().unwrap_or_default();
            let out = front.split_to(want);
            if !front.is_empty() {
                state.chunks.push_front(front);
            }
            out
        } else {
            let mut buf = BytesMut::with_capacity(want);
            while buf.len() < want {
                let Some(mut chunk) = state.chunks.pop_front() else {
                    break;
                };
                let take = (want - buf.len()).min(chunk.len());
                buf.extend_from_slice(&chunk.split_to(take));
                if !chunk.is_empty() {
                    state.chunks.push_front(chunk);
                }
            }
            buf.freeze()
        };

        state.len -= out.len();
        self.used.fetch_sub(out.len(), Ordering::AcqRel);
        drop(state);
        self.space.notify_all();
        Popped::Data(out)
    }

    /// Take everything currently buffered.
    pub fn pop_all(&self) -> Popped {
        self.pop_up_to(usize::MAX)
    }

    /// Mark the write side closed. Idempotent; wakes blocked pushers.
    pub fn close_write(&self) {
        self.lock().write_closed = true;
        self.space.notify_all();
    }

    pub fn is_write_closed(&self) -> bool {
        self.lock().write_closed
    }

    /// Discard buffered bytes.
    pub fn clear(&self) {
        let mut state = self.lock();
        self.used.fetch_sub(state.len, Ordering::AcqRel);
        state.len = 0;
        state.chunks.clear();
        drop(state);
        self.space.notify_all();
    }
}
