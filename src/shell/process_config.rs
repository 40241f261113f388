// src/shell/process_config.rs

//! Per-command launch settings.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{Cursor, Read, Write};
use std::path::PathBuf;

use crate::io::{ByteSink, sink_from_writer};

use super::context::ShellContext;

/// Environment values longer than this are shortened in rendered commands.
const ENV_DISPLAY_LIMIT: usize = 50;

/// Where a child's stdout or stderr goes.
#[derive(Default)]
pub enum SinkChoice {
    /// Ask the shell context's default producer.
    #[default]
    Inherit,
    /// Send the stream to `/dev/null`.
    Discard,
    /// Write to this sink; it is closed when the stream ends.
    Use(Box<dyn ByteSink>),
}

impl fmt::Debug for SinkChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkChoice::Inherit => f.write_str("Inherit"),
            SinkChoice::Discard => f.write_str("Discard"),
            SinkChoice::Use(_) => f.write_str("Use(..)"),
        }
    }
}

/// Everything needed to launch one command. Filled in by the `configure`
/// closure passed to [`crate::shell::Shell::program`] and friends.
pub struct ProcessConfiguration {
    pub arguments: Vec<String>,
    /// `None` runs in the shell's working directory.
    pub working_directory: Option<PathBuf>,
    /// Exit codes that `wait_for` accepts.
    pub exit_values: Vec<i32>,
    /// Replaces the inherited environment entirely when set.
    pub environment: Option<BTreeMap<String, String>>,
    /// Read to the end and fed to the child's stdin; `None` gives it `/dev/null`.
    pub stdin: Option<Box<dyn Read + Send>>,
    pub stdout: SinkChoice,
    pub stderr: SinkChoice,
    /// Track the process so shutdown hooks can kill it.
    pub register_for_shutdown: bool,
}

impl Default for ProcessConfiguration {
    fn default() -> Self {
        Self {
            arguments: Vec::new(),
            working_directory: None,
            exit_values: vec![0],
            environment: None,
            stdin: None,
            stdout: SinkChoice::Inherit,
            stderr: SinkChoice::Inherit,
            register_for_shutdown: true,
        }
    }
}

impl fmt::Debug for ProcessConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessConfiguration")
            .field("arguments", &self.arguments)
            .field("working_directory", &self.working_directory)
            .field("exit_values", &self.exit_values)
            .field("environment", &self.environment.as_ref().map(BTreeMap::len))
            .field("stdin", &self.stdin.is_some())
            .field("stdout", &self.stdout)
            .field("stderr", &self.stderr)
            .field("register_for_shutdown", &self.register_for_shutdown)
            .finish()
    }
}

impl ProcessConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    /// The program, i.e. the first argument.
    pub fn program(&self) -> &str {
        self.arguments.first().map(String::as_str).unwrap_or("")
    }

    pub fn arg(&mut self, argument: impl Into<String>) -> &mut Self {
        self.arguments.push(argument.into());
        self
    }

    pub fn args<I, S>(&mut self, arguments: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments.extend(arguments.into_iter().map(Into::into));
        self
    }

    pub fn working_directory(&mut self, dir: impl Into<PathBuf>) -> &mut Self {
        self.working_directory = Some(dir.into());
        self
    }

    /// Replace the accepted exit codes.
    pub fn accept_exit_values(&mut self, codes: impl IntoIterator<Item = i32>) -> &mut Self {
        self.exit_values = codes.into_iter().collect();
        self
    }

    /// Run with exactly these environment variables.
    pub fn environment<I, K, V>(&mut self, vars: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.environment = Some(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    pub fn stdin(&mut self, source: impl Read + Send + 'static) -> &mut Self {
        self.stdin = Some(Box::new(source));
        self
    }

    pub fn stdin_bytes(&mut self, bytes: impl Into<Vec<u8>>) -> &mut Self {
        self.stdin(Cursor::new(bytes.into()))
    }

    pub fn stdout(&mut self, sink: impl ByteSink + 'static) -> &mut Self {
        self.stdout = SinkChoice::Use(Box::new(sink));
        self
    }

    /// Write stdout to `writer`, dropping it when the stream ends.
    pub fn stdout_writer(&mut self, writer: impl Write + Send + 'static) -> &mut Self {
        self.stdout = SinkChoice::Use(sink_from_writer(writer));
        self
    }

    pub fn discard_stdout(&mut self) -> &mut Self {
        self.stdout = SinkChoice::Discard;
        self
    }

    pub fn stderr(&mut self, sink: impl ByteSink + 'static) -> &mut Self {
        self.stderr = SinkChoice::Use(Box::new(sink));
        self
    }

    pub fn stderr_writer(&mut self, writer: impl Write + Send + 'static) -> &mut Self {
        self.stderr = SinkChoice::Use(sink_from_writer(writer));
        self
    }

    pub fn discard_stderr(&mut self) -> &mut Self {
        self.stderr = SinkChoice::Discard;
        self
    }

    /// Leave the process alone at shutdown.
    pub fn detach_from_shutdown(&mut self) -> &mut Self {
        self.register_for_shutdown = false;
        self
    }

    pub(crate) fn take_stdout(&mut self, ctx: &ShellContext) -> Option<Box<dyn ByteSink>> {
        match std::mem::take(&mut self.stdout) {
            SinkChoice::Inherit => (ctx.default_stdout)(self),
            SinkChoice::Discard => None,
            SinkChoice::Use(sink) => Some(sink),
        }
    }

    pub(crate) fn take_stderr(&mut self, ctx: &ShellContext) -> Option<Box<dyn ByteSink>> {
        match std::mem::take(&mut self.stderr) {
            SinkChoice::Inherit => (ctx.default_stderr)(self),
            SinkChoice::Discard => None,
            SinkChoice::Use(sink) => Some(sink),
        }
    }

    /// Log line for this command: the working directory is only mentioned
    /// when it differs from the shell's.
    pub fn render(&self, ctx: &ShellContext) -> String {
        let dir = self
            .working_directory
            .as_ref()
            .filter(|dir| **dir != ctx.working_directory);
        self.render_with(dir)
    }

    fn render_with(&self, dir: Option<&PathBuf>) -> String {
        let mut out = format!("$ {}", self.arguments.join(" "));
        if let Some(dir) = dir {
            out.push_str(&format!("\n$ With working directory: {}", dir.display()));
        }
        if let Some(env) = &self.environment {
            let vars: Vec<String> = env
                .iter()
                .map(|(key, value)| format!("{key}={}", shorten(value)))
                .collect();
            out.push_str(&format!("\n$ With custom environment: {}", vars.join(" ")));
        }
        out
    }
}

impl fmt::Display for ProcessConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render_with(self.working_directory.as_ref()))
    }
}

fn shorten(value: &str) -> String {
    match value.char_indices().nth(ENV_DISPLAY_LIMIT) {
        Some((idx, _)) => format!("{}...", &value[..idx]),
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_mentions_directory_and_shortened_environment() {
        let mut config = ProcessConfiguration::new();
        config
            .args(["make", "-j4"])
            .working_directory("/src")
            .environment([("PATH", "/bin"), ("LONG", &"v".repeat(60)[..])]);

        let rendered = config.to_string();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "$ make -j4");
        assert_eq!(lines[1], "$ With working directory: /src");
        assert_eq!(
            lines[2],
            format!("$ With custom environment: LONG={}... PATH=/bin", "v".repeat(50))
        );
    }

    #[test]
    fn builder_defaults() {
        let mut config = ProcessConfiguration::new();
        config.arg("true");
        assert_eq!(config.program(), "true");
        assert_eq!(config.exit_values, vec![0]);
        assert!(config.register_for_shutdown);
        assert!(matches!(config.stdout, SinkChoice::Inherit));

        config.accept_exit_values([0, 1]).discard_stdout().detach_from_shutdown();
        assert_eq!(config.exit_values, vec![0, 1]);
        assert!(matches!(config.stdout, SinkChoice::Discard));
        assert!(!config.register_for_shutdown);
    }
}
