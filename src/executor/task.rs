//! Task definitions
//!
//! A task describes one external command: program, arguments, environment
//! overrides, working directory and what happens to its output.

#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, PipeReader, Read};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use tokio::process::{Child, Command};

use super::error::ExecError;

/// Status reported when the exit status could not be collected
pub const WAIT_FAILED: i32 = -1;

/// What to do with a child's stdout and stderr
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputPolicy {
    /// Send both streams through one pipe into the task's output buffer
    #[default]
    Capture,
    /// Share the parent's stdout and stderr
    Inherit,
    /// Send both streams to the null device
    Discard,
}

/// Single environment override
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EnvOverride {
    Set(String, String),
    Remove(String),
}

impl EnvOverride {
    /// Parse `NAME=VALUE` (set) or `NAME` (unset)
    pub fn parse(spec: &str) -> Result<Self, ExecError> {
        let (name, value) = match spec.split_once('=') {
            Some((name, value)) => (name, Some(value)),
            None => (spec, None),
        };

        if name.is_empty() {
            return Err(ExecError::InvalidEnv(spec.to_string()));
        }

        Ok(match value {
            Some(value) => EnvOverride::Set(name.to_string(), value.to_string()),
            None => EnvOverride::Remove(name.to_string()),
        })
    }
}

/// External command description
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Task {
    program: String,
    args: Vec<String>,
    env: Vec<EnvOverride>,
    current_dir: Option<PathBuf>,
    output: OutputPolicy,
}

impl Task {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            current_dir: None,
            output: OutputPolicy::default(),
        }
    }

    /// Build a task from an argv-style slice; `None` when it is empty
    pub fn from_argv<S: AsRef<str>>(argv: &[S]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self::new(program.as_ref()).args(args.iter().map(|a| a.as_ref())))
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push(EnvOverride::Set(name.into(), value.into()));
        self
    }

    pub fn env_remove(mut self, name: impl Into<String>) -> Self {
        self.env.push(EnvOverride::Remove(name.into()));
        self
    }

    pub fn env_overrides(mut self, overrides: impl IntoIterator<Item = EnvOverride>) -> Self {
        self.env.extend(overrides);
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn output(mut self, policy: OutputPolicy) -> Self {
        self.output = policy;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Build the command, plus the read end of the merged output pipe in
    /// `Capture` mode
    fn command(&self) -> io::Result<(Command, Option<PipeReader>)> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        for env in &self.env {
            match env {
                EnvOverride::Set(name, value) => {
                    cmd.env(name, value);
                }
                EnvOverride::Remove(name) => {
                    cmd.env_remove(name);
                }
            }
        }

        if let Some(ref dir) = self.current_dir {
            cmd.current_dir(dir);
        }

        // stdout and stderr share one pipe so their lines stay in order
        let output = match self.output {
            OutputPolicy::Capture => {
                let (reader, writer) = io::pipe()?;
                cmd.stdout(writer.try_clone()?).stderr(writer);
                Some(reader)
            }
            OutputPolicy::Inherit => {
                cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
                None
            }
            OutputPolicy::Discard => {
                cmd.stdout(Stdio::null()).stderr(Stdio::null());
                None
            }
        };

        cmd.stdin(Stdio::null()).kill_on_drop(true);
        Ok((cmd, output))
    }

    /// Start the process
    pub fn spawn(&self) -> Result<RunningTask, ExecError> {
        let spawn_error = |source| ExecError::Spawn {
            program: self.program.clone(),
            source,
        };

        let (mut cmd, output) = self.command().map_err(spawn_error)?;
        let child = cmd.spawn().map_err(spawn_error)?;
        // drop our copies of the pipe's write end so the reader sees EOF
        drop(cmd);

        Ok(RunningTask { child, output })
    }
}

/// A started child process
#[derive(Debug)]
pub struct RunningTask {
    child: Child,
    output: Option<PipeReader>,
}

impl RunningTask {
    /// Wait for the child to exit
    ///
    /// Returns the exit status and, in `Capture` mode, everything the child
    /// wrote to stdout and stderr in the order it was written.
    pub async fn wait_with_output(mut self) -> io::Result<(ExitStatus, Vec<u8>)> {
        let reader = self.output.take().map(|mut pipe| {
            tokio::task::spawn_blocking(move || {
                let mut bytes = Vec::new();
                pipe.read_to_end(&mut bytes).map(|_| bytes)
            })
        });

        let status = self.child.wait().await?;

        let output = match reader {
            Some(handle) => handle.await.map_err(io::Error::other)??,
            None => Vec::new(),
        };
        Ok((status, output))
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Outcome of a task that ran
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatus {
    code: i32,
    duration_ms: u64,
}

impl TaskStatus {
    pub fn new(code: i32, duration_ms: u64) -> Self {
        Self { code, duration_ms }
    }

    /// Exit code, `128 + signal` for signalled children, or [`WAIT_FAILED`]
    pub fn from_exit(status: ExitStatus, duration_ms: u64) -> Self {
        let code = status.code().unwrap_or_else(|| signal_code(&status));
        Self { code, duration_ms }
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn success(&self) -> bool {
        self.code == 0
    }
}

#[cfg(unix)]
fn signal_code(status: &ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status.signal().map(|sig| 128 + sig).unwrap_or(WAIT_FAILED)
}

#[cfg(not(unix))]
fn signal_code(_status: &ExitStatus) -> i32 {
    WAIT_FAILED
}
