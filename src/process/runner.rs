//! Command runner abstraction
//!
//! Provides a trait for running external tools that can be implemented
//! by the native process backend or by a scripted fake in tests.

use crate::error::{DockhandError, DockhandResult};
use crate::process::error_output;
use async_trait::async_trait;

/// A single external command invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program to execute (resolved through PATH)
    pub program: String,
    /// Arguments, passed verbatim
    pub args: Vec<String>,
    /// Data written to the child's stdin, if any
    pub stdin: Option<String>,
    /// Forward output lines to the log while the command runs
    pub stream: bool,
}

impl CommandSpec {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            stdin: None,
            stream: false,
        }
    }

    /// Feed `input` to the command on stdin
    pub fn with_stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Stream output to the log as it is produced
    pub fn streaming(mut self) -> Self {
        self.stream = true;
        self
    }

    /// Human-readable command line for logs and errors
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when terminated by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Turn a non-zero exit into a `CommandExecution` error.
    pub fn check(self, spec: &CommandSpec) -> DockhandResult<Self> {
        if self.success() {
            return Ok(self);
        }
        Err(DockhandError::command_exec(spec.display(), self.failure_detail()))
    }

    /// Error text for a failed command: stderr when present, else the tail
    /// of all output, else the exit status.
    pub fn failure_detail(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let tail = error_output(&self.stdout, "");
        if !tail.trim().is_empty() {
            return tail;
        }
        match self.code {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Abstract interface for running external tools
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command to completion and capture its output.
    ///
    /// A non-zero exit is not an error at this level; callers decide how
    /// to interpret it. Failing to start the program is.
    async fn run(&self, spec: &CommandSpec) -> DockhandResult<CommandOutput>;
}
