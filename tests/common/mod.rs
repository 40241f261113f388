#![allow(dead_code)]

pub use procpump_test_utils::{CountingSource, FakeControl, RecordingSink, init_tracing, with_timeout};

use procpump::shell::Shell;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::runtime::Runtime;

/// A multi-threaded runtime for blocking-style tests.
pub fn runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to build runtime")
}

/// A shell on `rt` that does not log every command.
pub fn quiet_shell(rt: &Runtime) -> Shell {
    init_tracing();
    Shell::new(rt.handle().clone()).scoped(|o| {
        o.log_commands(false);
    })
}

/// Deterministic random bytes.
pub fn random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut bytes = vec![0u8; len];
    rng.fill(&mut bytes[..]);
    bytes
}
