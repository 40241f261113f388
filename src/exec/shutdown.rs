// src/exec/shutdown.rs

//! Process registry and shutdown coordination.
//!
//! A [`ProcessStopper`] tracks every live process started with
//! `register_for_shutdown`. When shutdown begins it destroys all of them, and
//! destroys any process registered afterwards on sight. [`ShutdownHooks`] is
//! the explicit lifecycle hook list that drives it (usually from Ctrl-C).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::events::ProcessControl;
use super::process::{ProcessId, ProcessRef};

/// Receives process registrations from `start`.
pub trait ShutdownHandler: Send + Sync {
    fn add(&self, process: ProcessRef);
    fn remove(&self, id: ProcessId);
    fn is_shutting_down(&self) -> bool;
}

/// Shutdown handler that tracks nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoShutdown;

impl ShutdownHandler for NoShutdown {
    fn add(&self, _process: ProcessRef) {}

    fn remove(&self, _id: ProcessId) {}

    fn is_shutting_down(&self) -> bool {
        false
    }
}

#[derive(Default)]
struct StopperState {
    stopping: bool,
    live: HashMap<ProcessId, Arc<dyn ProcessControl>>,
}

/// Destroys every tracked process on [`ProcessStopper::stop`].
pub struct ProcessStopper {
    force: bool,
    state: Mutex<StopperState>,
}

impl std::fmt::Debug for ProcessStopper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("ProcessStopper")
            .field("force", &self.force)
            .field("stopping", &state.stopping)
            .field("live", &state.live.len())
            .finish()
    }
}

impl Default for ProcessStopper {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ProcessStopper {
    /// `force` selects SIGKILL over SIGTERM.
    pub fn new(force: bool) -> Self {
        Self {
            force,
            state: Mutex::new(StopperState::default()),
        }
    }

    /// Create a stopper whose `stop` runs as a shutdown hook.
    pub fn install(hooks: &ShutdownHooks, force: bool) -> Arc<Self> {
        let stopper = Arc::new(Self::new(force));
        let hooked = Arc::clone(&stopper);
        hooks.on_shutdown(0, move || hooked.stop());
        stopper
    }

    fn lock(&self) -> MutexGuard<'_, StopperState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of processes currently tracked.
    pub fn live_count(&self) -> usize {
        self.lock().live.len()
    }

    /// Enter the stopping state and destroy every tracked process.
    pub fn stop(&self) {
        let drained: Vec<_> = {
            let mut state = self.lock();
            state.stopping = true;
            state.live.drain().collect()
        };
        info!(count = drained.len(), force = self.force, "stopping processes");
        for (id, control) in drained {
            debug!(%id, pid = ?control.pid(), "destroying process on shutdown");
            control.destroy(self.force);
        }
    }
}

impl ShutdownHandler for ProcessStopper {
    fn add(&self, process: ProcessRef) {
        let mut state = self.lock();
        if state.stopping {
            drop(state);
            debug!(id = %process.id, "process started during shutdown; destroying");
            process.control.destroy(self.force);
            return;
        }
        state.live.insert(process.id, process.control);
    }

    fn remove(&self, id: ProcessId) {
        self.lock().live.remove(&id);
    }

    fn is_shutting_down(&self) -> bool {
        self.lock().stopping
    }
}

type Hook = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct HookState {
    ran: bool,
    hooks: Vec<(i32, Hook)>,
}

/// Ordered one-shot shutdown hooks. Cheap to clone.
#[derive(Clone, Default)]
pub struct ShutdownHooks {
    state: Arc<Mutex<HookState>>,
}

impl std::fmt::Debug for ShutdownHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("ShutdownHooks")
            .field("ran", &state.ran)
            .field("pending", &state.hooks.len())
            .finish()
    }
}

impl ShutdownHooks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HookState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register `hook`. Lower priorities run first; equal priorities run in
    /// registration order. After [`Self::run`] the hook runs immediately.
    pub fn on_shutdown<F>(&self, priority: i32, hook: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.lock();
        if state.ran {
            drop(state);
            hook();
            return;
        }
        state.hooks.push((priority, Box::new(hook)));
    }

    pub fn has_run(&self) -> bool {
        self.lock().ran
    }

    /// Run every registered hook once. Later calls do nothing.
    pub fn run(&self) {
        let mut hooks = {
            let mut state = self.lock();
            if state.ran {
                return;
            }
            state.ran = true;
            std::mem::take(&mut state.hooks)
        };
        hooks.sort_by_key(|(priority, _)| *priority);
        debug!(count = hooks.len(), "running shutdown hooks");
        for (_, hook) in hooks {
            hook();
        }
    }

    /// Run the hooks when Ctrl-C arrives. Must be called within a tokio runtime.
    pub fn listen_for_ctrl_c(&self) -> JoinHandle<()> {
        let hooks = self.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            info!("Ctrl+C received; shutting down");
            hooks.run();
        })
    }
}
