//! External process execution
//!
//! Every tool the pipeline drives (`docker`, `git`, `aws`) is reached through
//! the [`CommandRunner`] trait so the phases can run against a scripted
//! runner in tests and the native runner in production.

mod native;
mod runner;
#[cfg(test)]
pub(crate) mod scripted;

pub use native::NativeRunner;
pub use runner::{CommandOutput, CommandRunner, CommandSpec};

use tokio::io::{AsyncBufReadExt, BufReader};

/// Max number of output lines to include in error messages.
const ERROR_TAIL_LINES: usize = 50;

/// Extract the useful tail of command output for error diagnostics.
///
/// Combines stdout and stderr, then returns the last `ERROR_TAIL_LINES`
/// lines so error messages are actionable without being overwhelming.
pub(crate) fn error_output(stdout: &str, stderr: &str) -> String {
    let lines: Vec<&str> = stdout.lines().chain(stderr.lines()).collect();
    let total = lines.len();
    let tail: Vec<&str> = if total > ERROR_TAIL_LINES {
        lines[total - ERROR_TAIL_LINES..].to_vec()
    } else {
        lines
    };
    tail.join("\n")
}

/// Stream stdout and stderr of a child process line by line.
///
/// `on_output` sees every line as it arrives. Returns the collected
/// `(stdout, stderr)` lines once both pipes close.
pub(crate) async fn stream_child_output(
    child: &mut tokio::process::Child,
    on_output: &(dyn Fn(&str) + Send + Sync),
) -> (Vec<String>, Vec<String>) {
    let mut stdout_lines = Vec::new();
    let mut stderr_lines = Vec::new();

    let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
        return (stdout_lines, stderr_lines);
    };

    let mut stderr_reader = BufReader::new(stderr).lines();
    let mut stdout_reader = BufReader::new(stdout).lines();

    let mut stderr_done = false;
    let mut stdout_done = false;

    while !stderr_done || !stdout_done {
        tokio::select! {
            line = stderr_reader.next_line(), if !stderr_done => {
                match line {
                    Ok(Some(line)) => {
                        on_output(&line);
                        stderr_lines.push(line);
                    }
                    _ => stderr_done = true,
                }
            }
            line = stdout_reader.next_line(), if !stdout_done => {
                match line {
                    Ok(Some(line)) => {
                        on_output(&line);
                        stdout_lines.push(line);
                    }
                    _ => stdout_done = true,
                }
            }
        }
    }

    (stdout_lines, stderr_lines)
}
