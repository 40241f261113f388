// src/exec/exit.rs

//! One-shot exit-code result shared between the OS layer and callers.

use std::io;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::Notify;
use tracing::trace;

use crate::errors::{Result, ShellError};

use super::executor::Executor;

/// How a process ended.
#[derive(Debug, Clone)]
pub enum ExitOutcome {
    Exited(i32),
    LaunchFailed {
        program: String,
        error: Arc<io::Error>,
    },
}

impl ExitOutcome {
    pub fn into_result(self) -> Result<i32> {
        match self {
            ExitOutcome::Exited(code) => Ok(code),
            ExitOutcome::LaunchFailed { program, error } => Err(ShellError::Launch {
                program,
                source: error,
            }),
        }
    }

    pub fn code(&self) -> Option<i32> {
        match self {
            ExitOutcome::Exited(code) => Some(*code),
            ExitOutcome::LaunchFailed { .. } => None,
        }
    }
}

type CompletionCallback = Box<dyn FnOnce(ExitOutcome) + Send>;

#[derive(Default)]
struct ExitState {
    outcome: Option<ExitOutcome>,
    callbacks: Vec<CompletionCallback>,
}

struct ExitShared {
    state: Mutex<ExitState>,
    settled: Condvar,
    notify: Notify,
    executor: Arc<dyn Executor>,
}

/// Settled exactly once with an [`ExitOutcome`]; cheap to clone.
#[derive(Clone)]
pub struct ExitFuture {
    shared: Arc<ExitShared>,
}

impl std::fmt::Debug for ExitFuture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExitFuture")
            .field("outcome", &self.lock().outcome)
            .finish_non_exhaustive()
    }
}

impl ExitFuture {
    /// Completion callbacks are dispatched onto `executor`.
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self {
            shared: Arc::new(ExitShared {
                state: Mutex::new(ExitState::default()),
                settled: Condvar::new(),
                notify: Notify::new(),
                executor,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ExitState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Resolve with an exit code. Returns false if already settled.
    pub fn complete(&self, code: i32) -> bool {
        self.settle(ExitOutcome::Exited(code))
    }

    /// Resolve with a launch failure. Returns false if already settled.
    pub fn fail(&self, program: impl Into<String>, error: io::Error) -> bool {
        self.settle(ExitOutcome::LaunchFailed {
            program: program.into(),
            error: Arc::new(error),
        })
    }

    fn settle(&self, outcome: ExitOutcome) -> bool {
        let callbacks = {
            let mut state = self.lock();
            if state.outcome.is_some() {
                return false;
            }
            trace!(?outcome, "exit future settled");
            state.outcome = Some(outcome.clone());
            std::mem::take(&mut state.callbacks)
        };
        self.shared.settled.notify_all();
        self.shared.notify.notify_waiters();
        for callback in callbacks {
            self.dispatch(callback, outcome.clone());
        }
        true
    }

    fn dispatch(&self, callback: CompletionCallback, outcome: ExitOutcome) {
        self.shared
            .executor
            .execute(Box::new(move || callback(outcome)));
    }

    /// Run `callback` on the worker pool once settled (immediately if it already is).
    pub fn on_complete<F>(&self, callback: F)
    where
        F: FnOnce(ExitOutcome) + Send + 'static,
    {
        let mut state = self.lock();
        match state.outcome.clone() {
            Some(outcome) => {
                drop(state);
                self.dispatch(Box::new(callback), outcome);
            }
            None => state.callbacks.push(Box::new(callback)),
        }
    }

    pub fn is_done(&self) -> bool {
        self.lock().outcome.is_some()
    }

    pub fn try_get(&self) -> Option<ExitOutcome> {
        self.lock().outcome.clone()
    }

    /// Block the calling thread until settled.
    pub fn wait(&self) -> Result<i32> {
        let mut state = self.lock();
        loop {
            if let Some(outcome) = state.outcome.clone() {
                return outcome.into_result();
            }
            state = self
                .shared
                .settled
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    /// As [`Self::wait`], giving up after `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<i32>> {
        let state = self.lock();
        let (state, _) = self
            .shared
            .settled
            .wait_timeout_while(state, timeout, |s| s.outcome.is_none())
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        state.outcome.clone().map(ExitOutcome::into_result)
    }

    /// Wait asynchronously until settled.
    pub async fn resolved(&self) -> Result<i32> {
        loop {
            let notified = self.shared.notify.notified();
            tokio::pin!(notified);
            // Register before checking so a concurrent settle cannot slip between.
            notified.as_mut().enable();
            if let Some(outcome) = self.try_get() {
                return outcome.into_result();
            }
            notified.await;
        }
    }
}
