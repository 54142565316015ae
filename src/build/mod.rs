//! Image build
//!
//! Derives tags from the commit and CI event, assembles the buildx
//! invocation, runs it and inspects the pushed result.

pub mod event;
pub mod plan;

pub use event::{CiEvent, TagPrefix};
pub use plan::{BuildPlan, DerivedTags};

use crate::error::{DockhandError, DockhandResult};
use crate::process::{CommandRunner, CommandSpec};
use tracing::{debug, info};

/// Run the build, returning the output tag
pub async fn run(runner: &dyn CommandRunner, plan: &BuildPlan) -> DockhandResult<String> {
    debug!("docker {}", plan.args().join(" "));
    let output = runner.run(&plan.command()).await?;
    if !output.success() {
        return Err(DockhandError::Build(format!(
            "buildx call failed: {}",
            output.failure_detail()
        )));
    }

    info!("Built {}", plan.output_tag());
    Ok(plan.output_tag().to_string())
}

/// Show the manifest of a pushed image
pub async fn inspect(runner: &dyn CommandRunner, tag: &str) -> DockhandResult<()> {
    let spec = CommandSpec::new("docker", ["buildx", "imagetools", "inspect", tag]).streaming();
    let output = runner.run(&spec).await?;
    if !output.success() {
        return Err(DockhandError::Build(format!(
            "inspecting {} failed: {}",
            tag,
            output.failure_detail()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::CacheConfig;
    use crate::inputs::Inputs;
    use crate::process::scripted::ScriptedRunner;

    fn plan() -> BuildPlan {
        let inputs = Inputs {
            repository: "org/app".to_string(),
            skip_tag_with_prefix: true,
            ..Default::default()
        };
        let tags = DerivedTags::derive(&inputs, Some("abc"), None).unwrap();
        BuildPlan::assemble(&inputs, &tags, &CacheConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn run_returns_output_tag() {
        let runner = ScriptedRunner::new();
        let tag = run(&runner, &plan()).await.unwrap();

        assert_eq!(tag, "org/app:abc");
        assert!(runner.was_called("docker buildx build"));
    }

    #[tokio::test]
    async fn failed_build_is_build_error() {
        let runner = ScriptedRunner::new().respond(
            "docker",
            &["buildx", "build"],
            1,
            "",
            "ERROR: failed to solve",
        );
        let err = run(&runner, &plan()).await.unwrap_err();

        assert!(matches!(err, DockhandError::Build(_)));
        assert!(err.to_string().contains("failed to solve"));
    }

    #[tokio::test]
    async fn failed_inspect_is_fatal() {
        let runner = ScriptedRunner::new().respond(
            "docker",
            &["buildx", "imagetools", "inspect"],
            1,
            "",
            "not found",
        );
        let err = inspect(&runner, "org/app:abc").await.unwrap_err();
        assert!(err.is_fatal());
    }
}
