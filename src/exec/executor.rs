// src/exec/executor.rs

//! Worker pool abstraction.
//!
//! Pump drain/fill loops perform blocking reads and writes against
//! caller-supplied sources and sinks, so they never run on the thread that
//! delivered a readiness callback. Instead they are submitted to an
//! [`Executor`]. Production code uses tokio's blocking pool through
//! [`tokio::runtime::Handle`]; tests can plug in anything that runs jobs.

use std::sync::Arc;

use tracing::trace;

/// A unit of work submitted to an [`Executor`].
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Something that runs jobs on worker threads.
///
/// Implementations must not run the job on the calling thread while holding
/// any lock of the caller; running it inline is otherwise allowed.
pub trait Executor: Send + Sync {
    fn execute(&self, job: Job);
}

/// Tokio's blocking pool: a lazily grown set of threads that exit when idle.
impl Executor for tokio::runtime::Handle {
    fn execute(&self, job: Job) {
        trace!("submitting job to blocking pool");
        // The JoinHandle is dropped on purpose; jobs report through logs.
        drop(self.spawn_blocking(job));
    }
}

impl<E: Executor + ?Sized> Executor for Arc<E> {
    fn execute(&self, job: Job) {
        (**self).execute(job)
    }
}

/// Executor backed by the runtime of the current tokio context.
///
/// Panics when called outside a tokio runtime, like `tokio::spawn`.
pub fn current_executor() -> Arc<dyn Executor> {
    Arc::new(tokio::runtime::Handle::current())
}
