mod common;

use common::{quiet_shell, random_bytes, runtime};
use procpump::shell::BashOptions;

#[test]
fn echo_output_is_collected() {
    let rt = runtime();
    let shell = quiet_shell(&rt);

    let (process, output) = shell.collect_stdout(|sh| {
        sh.command("echo", ["foo"], |_| {}).unwrap()
    });
    assert_eq!(process.wait_for().unwrap(), 0);
    assert_eq!(output.text(), "foo\n");
}

#[test]
fn long_argument_is_echoed_intact() {
    let rt = runtime();
    let shell = quiet_shell(&rt);
    let long = "foo".repeat(9000);

    let (process, output) = shell.collect_stdout(|sh| sh.program("echo", |c| {
        c.arg(long.clone());
    }));
    process.wait_for().unwrap();
    assert_eq!(output.text(), format!("{long}\n"));
}

#[test]
fn stdin_reaches_the_script() {
    let rt = runtime();
    let shell = quiet_shell(&rt);

    let (process, output) = shell.collect_stdout(|sh| {
        sh.bash("read line; echo \"got $line\"", BashOptions::default(), |c| {
            c.stdin_bytes("foo bar\n");
        })
    });
    process.wait_for().unwrap();
    assert_eq!(output.text(), "got foo bar\n");
}

#[test]
fn cat_round_trips_bytes_of_many_sizes() {
    let rt = runtime();
    let shell = quiet_shell(&rt);

    for (seed, len) in [0usize, 1, 4095, 12_500, 65_536, 300_001].into_iter().enumerate() {
        let bytes = random_bytes(len, seed as u64);
        let (process, output) = shell.collect_stdout(|sh| {
            sh.program("cat", |c| {
                c.stdin_bytes(bytes.clone());
            })
        });
        process.wait_for().unwrap();
        assert_eq!(output.bytes(), bytes, "round trip of {len} bytes");
    }
}

#[test]
fn cat_round_trips_several_megabytes_without_delimiters() {
    let rt = runtime();
    let shell = quiet_shell(&rt);
    let bytes: Vec<u8> = random_bytes(5 * 1024 * 1024, 99)
        .into_iter()
        .map(|b| if b == b'\n' { b' ' } else { b })
        .collect();

    let (process, output) = shell.collect_stdout(|sh| {
        sh.command("cat -", Vec::<String>::new(), |c| {
            c.stdin_bytes(bytes.clone());
        })
        .unwrap()
    });
    process.wait_for().unwrap();
    let received = output.bytes();
    assert_eq!(received.len(), bytes.len());
    assert!(received == bytes);
}

#[test]
fn small_output_limit_still_delivers_everything() {
    let rt = runtime();
    let shell = quiet_shell(&rt).scoped(|o| {
        o.output_buffer_limit(1024).stdin_read_ahead(512);
    });
    let bytes = random_bytes(256 * 1024, 7);

    let (process, output) = shell.collect_stdout(|sh| {
        sh.program("cat", |c| {
            c.stdin_bytes(bytes.clone());
        })
    });
    process.wait_for().unwrap();
    assert!(output.bytes() == bytes);
}

#[test]
fn stderr_is_collected_separately() {
    let rt = runtime();
    let shell = quiet_shell(&rt);

    let ((process, stdout), stderr) = shell.collect_stderr(|sh| {
        sh.collect_stdout(|sh| {
            sh.bash("echo out; echo err 1>&2", BashOptions::default(), |_| {})
        })
    });
    process.wait_for().unwrap();
    assert_eq!(stdout.text(), "out\n");
    assert_eq!(stderr.text(), "err\n");
}

#[test]
fn script_arguments_become_positional_parameters() {
    let rt = runtime();
    let shell = quiet_shell(&rt);
    let long = "bar".repeat(8000);

    let (process, stderr) = shell.collect_stderr(|sh| {
        sh.bash("echo \"$1\" 1>&2", BashOptions::default(), |c| {
            c.args(["scriptname", long.as_str()]);
        })
    });
    process.wait_for().unwrap();
    assert_eq!(stderr.text(), format!("{long}\n"));
}

#[test]
fn discarded_stdout_is_not_collected() {
    let rt = runtime();
    let shell = quiet_shell(&rt);

    let (process, output) = shell.collect_stdout(|sh| {
        sh.program("echo", |c| {
            c.arg("nothing to see").discard_stdout();
        })
    });
    process.wait_for().unwrap();
    assert!(output.bytes().is_empty());
}

#[test]
fn explicit_sink_and_working_directory() {
    let rt = runtime();
    let shell = quiet_shell(&rt);
    let dir = tempfile::tempdir().unwrap();
    let sink = common::RecordingSink::new();

    let process = shell.program("pwd", |c| {
        c.working_directory(dir.path()).stdout(sink.clone());
    });
    process.wait_for().unwrap();

    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(10);
    while sink.closes() == 0 {
        assert!(std::time::Instant::now() < deadline, "sink never closed");
        std::thread::sleep(std::time::Duration::from_millis(5));
    }
    let printed = String::from_utf8(sink.bytes()).unwrap();
    let expected = dir.path().canonicalize().unwrap();
    assert_eq!(std::path::Path::new(printed.trim_end()).canonicalize().unwrap(), expected);
    assert_eq!(sink.closes(), 1);
}

#[test]
fn environment_override_replaces_inherited_variables() {
    let rt = runtime();
    let shell = quiet_shell(&rt);

    let (process, output) = shell.collect_stdout(|sh| {
        sh.program("/usr/bin/env", |c| {
            c.environment([("ONLY_ME", "1")]);
        })
    });
    process.wait_for().unwrap();
    assert_eq!(output.text(), "ONLY_ME=1\n");
}

struct ClosedPipe;

impl procpump::io::ByteSink for ClosedPipe {
    fn write(&mut self, _data: &[u8]) -> std::io::Result<()> {
        Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
    }
}

#[test]
fn output_drains_even_when_the_sink_rejects_every_write() {
    let rt = runtime();
    let shell = quiet_shell(&rt);

    let process = shell.program("seq", |c| {
        c.arg("100000").stdout(ClosedPipe);
    });
    assert_eq!(process.wait_for().unwrap(), 0);
    rt.block_on(common::with_timeout(process.output_drained()));
}
