//! buildx builder lifecycle
//!
//! A job either uses a named builder it was given or creates a throwaway
//! `builder-{uuid}` instance, recorded in job state before it exists so the
//! post invocation can remove it even when creation fails halfway.

use crate::config::schema::BuilderConfig;
use crate::error::{DockhandError, DockhandResult};
use crate::process::{CommandRunner, CommandSpec};
use crate::state::JobState;
use crate::ui::{self, UiContext};
use regex::Regex;
use semver::Version;
use std::sync::LazyLock;
use tracing::{debug, info};
use uuid::Uuid;

static BUILDX_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\sv?([0-9.]+)").expect("valid buildx version regex"));

/// Parse `docker buildx version` output
pub fn parse_version(output: &str) -> DockhandResult<Version> {
    let raw = BUILDX_VERSION
        .captures(output)
        .map(|caps| caps[1].trim_matches('.').to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| DockhandError::Builder("Cannot parse Buildx version".to_string()))?;

    let mut parts: Vec<&str> = raw.split('.').collect();
    while parts.len() < 3 {
        parts.push("0");
    }
    Version::parse(&parts[..3].join(".")).map_err(|e| {
        DockhandError::Builder(format!("Cannot clean buildx semver version {}: {}", raw, e))
    })
}

/// Fresh builder name
pub fn generate_name() -> String {
    format!("builder-{}", Uuid::new_v4())
}

/// Creates, selects and removes buildx builders
pub struct BuilderManager<'a> {
    runner: &'a dyn CommandRunner,
    config: &'a BuilderConfig,
    ui: &'a UiContext,
}

impl<'a> BuilderManager<'a> {
    const PROGRAM: &'static str = "docker";

    pub fn new(
        runner: &'a dyn CommandRunner,
        config: &'a BuilderConfig,
        ui: &'a UiContext,
    ) -> Self {
        Self { runner, config, ui }
    }

    async fn docker<I, S>(&self, args: I) -> DockhandResult<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let spec = CommandSpec::new(Self::PROGRAM, args);
        let output = self.runner.run(&spec).await?;
        if !output.success() {
            return Err(DockhandError::Builder(format!(
                "{} failed: {}",
                spec.display(),
                output.failure_detail()
            )));
        }
        Ok(output.stdout)
    }

    /// Installed buildx version
    pub async fn version(&self) -> DockhandResult<Version> {
        let output = self.docker(["buildx", "version"]).await?;
        parse_version(&output)
    }

    /// Make a builder current, creating one when `name` is `None`.
    ///
    /// Returns the name of the builder in use.
    pub async fn ensure(
        &self,
        name: Option<&str>,
        state: &JobState<'_>,
    ) -> DockhandResult<String> {
        let version = self.version().await?;
        info!("Buildx version: {}", version);

        let name = match name {
            Some(name) => name.to_string(),
            None => {
                let name = generate_name();
                state.set_builder_name(&name).await?;
                self.create(&name).await?;
                self.bootstrap(&name).await?;
                name
            }
        };

        self.select(&name).await?;
        Ok(name)
    }

    async fn create(&self, name: &str) -> DockhandResult<()> {
        let _group = ui::group(self.ui, "Creating a new builder instance");

        let context = self.config.context.as_str();
        let spec = CommandSpec::new(Self::PROGRAM, ["context", "create", context]);
        let output = self.runner.run(&spec).await?;
        if !output.success() {
            if output.stderr.contains("already exists") {
                debug!("docker context {} already exists", context);
            } else {
                return Err(DockhandError::Builder(format!(
                    "creating docker context {} failed: {}",
                    context,
                    output.failure_detail()
                )));
            }
        }

        self.docker([
            "buildx",
            "create",
            "--name",
            name,
            "--driver",
            self.config.driver.as_str(),
            context,
        ])
        .await?;
        Ok(())
    }

    async fn bootstrap(&self, name: &str) -> DockhandResult<()> {
        let _group = ui::group(self.ui, "Booting builder");
        self.docker(["buildx", "inspect", "--bootstrap", "--builder", name])
            .await?;
        Ok(())
    }

    async fn select(&self, name: &str) -> DockhandResult<()> {
        let _group = ui::group(self.ui, "Using builder");
        self.docker(["buildx", "use", name]).await?;
        let builders = self.docker(["buildx", "ls"]).await?;
        info!("{}", builders.trim_end());
        Ok(())
    }

    /// Remove a builder created by this job; an empty name is a no-op
    pub async fn stop(&self, name: &str) -> DockhandResult<()> {
        if name.is_empty() {
            return Ok(());
        }

        let _group = ui::group(self.ui, "Cleaning up builder");
        let spec = CommandSpec::new(Self::PROGRAM, ["buildx", "rm", name]);
        let teardown_err = |reason: String| DockhandError::BuilderTeardown {
            name: name.to_string(),
            reason,
        };

        let output = self
            .runner
            .run(&spec)
            .await
            .map_err(|e| teardown_err(e.to_string()))?;
        if !output.success() {
            return Err(teardown_err(output.failure_detail()));
        }

        info!("Removed builder {}", name);
        Ok(())
    }
}
