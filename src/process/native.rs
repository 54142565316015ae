//! Native process runner
//!
//! Implements the CommandRunner trait by spawning real processes through
//! tokio.

use crate::error::{DockhandError, DockhandResult};
use crate::process::runner::{CommandOutput, CommandRunner, CommandSpec};
use crate::process::stream_child_output;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

/// Runs commands as child processes of the current process
#[derive(Debug, Default)]
pub struct NativeRunner;

impl NativeRunner {
    pub fn new() -> Self {
        Self
    }

    fn spawn_error(spec: &CommandSpec, e: std::io::Error) -> DockhandError {
        if e.kind() == ErrorKind::NotFound {
            DockhandError::CliNotFound {
                name: spec.program.clone(),
                hint: format!("`{}` must be on PATH", spec.program),
            }
        } else {
            DockhandError::command_failed(spec.display(), e)
        }
    }
}

#[async_trait]
impl CommandRunner for NativeRunner {
    async fn run(&self, spec: &CommandSpec) -> DockhandResult<CommandOutput> {
        debug!("Executing: {}", spec.display());

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(if spec.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| Self::spawn_error(spec, e))?;

        if let (Some(input), Some(mut stdin)) = (&spec.stdin, child.stdin.take()) {
            stdin
                .write_all(input.as_bytes())
                .await
                .map_err(|e| DockhandError::command_failed(spec.display(), e))?;
            // Closing stdin lets tools like `docker login --password-stdin` proceed
            drop(stdin);
        }

        if spec.stream {
            let (stdout, stderr) = stream_child_output(&mut child, &|line| info!("{}", line)).await;
            let status = child
                .wait()
                .await
                .map_err(|e| DockhandError::command_failed(spec.display(), e))?;
            return Ok(CommandOutput {
                code: status.code(),
                stdout: stdout.join("\n"),
                stderr: stderr.join("\n"),
            });
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| DockhandError::command_failed(spec.display(), e))?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_program_is_cli_not_found() {
        let runner = NativeRunner::new();
        let spec = CommandSpec::new("dockhand-no-such-program", ["--version"]);
        let err = runner.run(&spec).await.unwrap_err();
        assert!(matches!(err, DockhandError::CliNotFound { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let runner = NativeRunner::new();
        let spec = CommandSpec::new("sh", ["-c", "echo hello; exit 3"]);
        let output = runner.run(&spec).await.unwrap();
        assert_eq!(output.code, Some(3));
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn feeds_stdin() {
        let runner = NativeRunner::new();
        let spec = CommandSpec::new("cat", Vec::<String>::new()).with_stdin("secret");
        let output = runner.run(&spec).await.unwrap();
        assert!(output.success());
        assert_eq!(output.stdout, "secret");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn streaming_collects_both_pipes() {
        let runner = NativeRunner::new();
        let spec = CommandSpec::new("sh", ["-c", "echo out; echo err >&2"]).streaming();
        let output = runner.run(&spec).await.unwrap();
        assert!(output.success());
        assert_eq!(output.stdout, "out");
        assert_eq!(output.stderr, "err");
    }
}
