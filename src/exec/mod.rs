// src/exec/mod.rs

//! Process execution layer.
//!
//! Moves bytes between this process and its children without a thread per
//! stream:
//!
//! - [`driver`] owns the OS side (tokio::process) and reports [`ProcessEvent`]s.
//! - [`handler`] turns those events into pumper operations.
//! - [`input_pumper`] / [`output_pumper`] buffer data between the callback
//!   world and blocking sources/sinks, draining on the [`executor`] pool via
//!   [`single_flight`] scheduling.
//! - [`process`] launches a configured command and hands back a
//!   [`ShellProcess`]; [`shutdown`] tracks live processes for teardown.

pub mod driver;
pub mod events;
pub mod executor;
pub mod exit;
pub mod handler;
pub mod input_pumper;
pub mod output_pumper;
pub mod pipe;
pub mod process;
pub mod shutdown;
pub mod single_flight;

pub use driver::TokioDriver;
pub use events::{LaunchSpec, ProcessControl, ProcessDriver, ProcessEvent, ProcessListener};
pub use executor::{Executor, Job, current_executor};
pub use exit::{ExitFuture, ExitOutcome};
pub use handler::{ProcessEventHandler, PumpLimits};
pub use input_pumper::InputPumper;
pub use output_pumper::OutputPumper;
pub use process::{ProcessId, ProcessRef, ShellProcess, start};
pub use shutdown::{NoShutdown, ProcessStopper, ShutdownHandler, ShutdownHooks};
pub use single_flight::SingleConcurrentExecution;
