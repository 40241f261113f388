mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{quiet_shell, runtime};
use procpump::exec::{ProcessStopper, ShutdownHandler};
use procpump::shell::BashOptions;

const DEATH: Duration = Duration::from_secs(10);

#[test]
fn running_hooks_kills_registered_processes() {
    let rt = runtime();
    let shell = quiet_shell(&rt);

    let sleeper = shell.program("sleep", |c| {
        c.arg("30").accept_exit_values([-1]);
    });
    assert!(sleeper.exit_code().wait_timeout(Duration::from_millis(100)).is_none());

    shell.shutdown_hooks().run();
    assert!(shell.shutdown_hooks().has_run());
    assert!(shell.context().shutdown_handler.is_shutting_down());

    let code = sleeper.exit_code().wait_timeout(DEATH).expect("sleeper survived");
    assert_eq!(code.unwrap(), -1);
}

#[test]
fn process_started_during_shutdown_is_destroyed() {
    let rt = runtime();
    let shell = quiet_shell(&rt);
    shell.shutdown_hooks().run();

    let late = shell.program("sleep", |c| {
        c.arg("30").accept_exit_values([-1]);
    });
    let code = late.exit_code().wait_timeout(DEATH).expect("late process survived");
    assert_eq!(code.unwrap(), -1);
}

#[test]
fn detached_process_outlives_shutdown() {
    let rt = runtime();
    let shell = quiet_shell(&rt);

    let detached = shell.bash("sleep 0.5", BashOptions::default(), |c| {
        c.detach_from_shutdown();
    });
    shell.shutdown_hooks().run();
    assert_eq!(detached.wait_for().unwrap(), 0);
}

#[test]
fn finished_processes_leave_the_registry() {
    let rt = runtime();
    let stopper = Arc::new(ProcessStopper::new(true));
    let shell = quiet_shell(&rt).scoped(|o| {
        o.shutdown_handler(stopper.clone());
    });

    let quick = shell.program("true", |_| {});
    assert_eq!(quick.wait_for().unwrap(), 0);

    // Removal runs as a completion callback on the worker pool.
    let deadline = std::time::Instant::now() + DEATH;
    while stopper.live_count() > 0 {
        assert!(std::time::Instant::now() < deadline, "process never removed");
        std::thread::sleep(Duration::from_millis(5));
    }

    let sleeper = shell.program("sleep", |c| {
        c.arg("30").accept_exit_values([-1]);
    });
    assert_eq!(stopper.live_count(), 1);
    stopper.stop();
    let code = sleeper.exit_code().wait_timeout(DEATH).expect("sleeper survived");
    assert_eq!(code.unwrap(), -1);
}

#[test]
fn graceful_stop_sends_sigterm() {
    let rt = runtime();
    let stopper = Arc::new(ProcessStopper::new(false));
    let shell = quiet_shell(&rt).scoped(|o| {
        o.shutdown_handler(stopper.clone());
    });

    let (process, output) = shell.collect_stdout(|sh| {
        sh.bash(
            "trap 'echo terminated; exit 5' TERM; echo ready; while true; do sleep 0.1; done",
            BashOptions::default(),
            |c| {
                c.accept_exit_values([5]);
            },
        )
    });

    let deadline = std::time::Instant::now() + DEATH;
    while !output.snapshot().starts_with(b"ready\n") {
        assert!(std::time::Instant::now() < deadline, "script never became ready");
        std::thread::sleep(Duration::from_millis(10));
    }
    stopper.stop();
    assert_eq!(process.wait_for().unwrap(), 5);
    assert_eq!(output.text(), "ready\nterminated\n");
}
