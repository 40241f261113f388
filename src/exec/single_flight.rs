// src/exec/single_flight.rs

//! Single-flight scheduling.
//!
//! [`SingleConcurrentExecution`] runs a callback on an [`Executor`] such that
//! at most one invocation is active at a time, while every `run()` request is
//! guaranteed to be observed:
//!
//! - `running`: a worker loop is currently active.
//! - `required`: a run was requested since the active loop last started an
//!   iteration.
//!
//! Both flags live under a single mutex. A worker clears `required` before each
//! iteration and only clears `running` after checking `required` under the same
//! lock, so a request that lands while the callback executes always causes one
//! more iteration instead of being lost.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{error, trace};

use super::executor::Executor;

type Callback = Box<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

#[derive(Debug, Default)]
struct Flags {
    running: bool,
    required: bool,
}

struct Inner {
    name: &'static str,
    executor: Arc<dyn Executor>,
    flags: Mutex<Flags>,
    callback: Callback,
}

/// Coalescing, single-worker scheduler for a callback.
///
/// Cloning yields another handle to the same scheduler.
#[derive(Clone)]
pub struct SingleConcurrentExecution {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SingleConcurrentExecution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleConcurrentExecution")
            .field("name", &self.inner.name)
            .field("flags", &*self.inner.lock_flags())
            .finish_non_exhaustive()
    }
}

impl SingleConcurrentExecution {
    pub fn new<F>(name: &'static str, executor: Arc<dyn Executor>, callback: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                name,
                executor,
                flags: Mutex::new(Flags::default()),
                callback: Box::new(callback),
            }),
        }
    }

    /// Request an execution of the callback.
    ///
    /// Never blocks on the callback. If a worker is already looping it will
    /// pick the request up; otherwise a new worker is submitted.
    pub fn run(&self) {
        let to_run = {
            let mut flags = self.inner.lock_flags();
            flags.required = true;
            if flags.running {
                false
            } else {
                flags.running = true;
                true
            }
        };

        if to_run {
            let inner = Arc::clone(&self.inner);
            self.inner.executor.execute(Box::new(move || inner.run_loop()));
        }
    }

    /// Whether a worker loop is currently active.
    pub fn is_running(&self) -> bool {
        self.inner.lock_flags().running
    }
}

impl Inner {
    fn lock_flags(&self) -> MutexGuard<'_, Flags> {
        // The flags are two booleans; a poisoned guard still holds valid data.
        self.flags.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn run_loop(&self) {
        loop {
            trace!(job = self.name, "starting job");
            self.lock_flags().required = false;

            match catch_unwind(AssertUnwindSafe(|| (self.callback)())) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    error!(job = self.name, error = %err, "while running single concurrent job");
                }
                Err(panic) => {
                    error!(
                        job = self.name,
                        panic = panic_message(&panic),
                        "single concurrent job panicked"
                    );
                }
            }

            let mut flags = self.lock_flags();
            if !flags.required {
                flags.running = false;
                return;
            }
        }
    }
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}
