//! Version control queries

use crate::error::{DockhandError, DockhandResult};
use crate::process::{CommandRunner, CommandSpec};

/// Commit SHA of the checked out HEAD
pub async fn head_sha(runner: &dyn CommandRunner) -> DockhandResult<String> {
    let spec = CommandSpec::new("git", ["rev-parse", "HEAD"]);
    let output = runner.run(&spec).await?;
    if !output.success() {
        return Err(DockhandError::command_exec(
            "could not get git head sha",
            output.failure_detail(),
        ));
    }

    let sha = output.stdout.trim();
    if sha.is_empty() {
        return Err(DockhandError::command_exec(
            spec.display(),
            "empty output",
        ));
    }
    Ok(sha.to_string())
}
