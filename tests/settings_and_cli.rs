mod common;

use std::fs;

use clap::Parser;
use common::{init_tracing, with_timeout};
use procpump::cli::CliArgs;
use procpump::config::{load_from_path, load_settings};
use procpump::errors::ShellError;
use procpump::shell::{BashOptions, Shell};

#[test]
fn settings_file_is_loaded_with_defaults_for_missing_keys() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Procpump.toml");
    fs::write(
        &path,
        format!(
            "working_directory = {:?}\nexit_values = [0, 3]\nstdin_read_ahead = 4096\n",
            dir.path().display().to_string()
        ),
    )
    .unwrap();

    let settings = load_settings(&path).unwrap();
    assert_eq!(settings.working_directory.as_deref(), Some(dir.path()));
    assert_eq!(settings.exit_values, vec![0, 3]);
    assert_eq!(settings.stdin_read_ahead, 4096);
    assert!(settings.log_commands);
    assert!(settings.force_kill_on_shutdown);
}

#[test]
fn unknown_keys_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "log_comands = false\n").unwrap();

    let err = load_from_path(&path).unwrap_err();
    assert!(matches!(err, ShellError::TomlError(_)), "got {err}");
}

#[test]
fn zero_limits_fail_validation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("zero.toml");
    fs::write(&path, "output_buffer_limit = 0\n").unwrap();

    let err = load_settings(&path).unwrap_err();
    assert!(matches!(err, ShellError::ConfigError(_)), "got {err}");
    assert!(err.to_string().contains("output_buffer_limit"));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_settings(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ShellError::IoError(_)));
}

#[test]
fn loaded_settings_shape_the_shell() {
    let rt = common::runtime();
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Procpump.toml");
    fs::write(&path, "log_commands = false\nexit_values = [0, 9]\n").unwrap();
    let settings = load_settings(&path).unwrap();

    let shell = Shell::from_settings(&settings, rt.handle().clone());
    assert!(!shell.context().log_commands);
    let code = shell
        .bash("exit 9", BashOptions::default(), |_| {})
        .wait_for()
        .unwrap();
    assert_eq!(code, 9);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn run_returns_the_child_exit_code() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("quiet.toml");
    fs::write(&config, "log_commands = false\n").unwrap();
    let config = config.display().to_string();

    let args = CliArgs::try_parse_from([
        "procpump", "--config", config.as_str(), "--", "bash", "-c", "exit 4",
    ])
    .unwrap();
    assert_eq!(with_timeout(procpump::run(args)).await.unwrap(), 4);

    let args = CliArgs::try_parse_from([
        "procpump", "--config", config.as_str(), "--accept", "0", "4", "--lines", "--",
        "bash", "-c", "echo hi; exit 4",
    ])
    .unwrap();
    assert_eq!(with_timeout(procpump::run(args)).await.unwrap(), 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn run_reports_launch_failures() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("quiet.toml");
    fs::write(&config, "log_commands = false\n").unwrap();
    let config = config.display().to_string();

    let args = CliArgs::try_parse_from([
        "procpump", "--config", config.as_str(), "no-such-program-4b1e",
    ])
    .unwrap();
    let err = with_timeout(procpump::run(args)).await.unwrap_err();
    assert!(format!("{err:#}").contains("no-such-program-4b1e"));
}
