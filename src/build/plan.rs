//! Build command assembly

use crate::build::event::TagPrefix;
use crate::config::schema::CacheConfig;
use crate::error::{DockhandError, DockhandResult};
use crate::inputs::Inputs;
use crate::process::CommandSpec;

/// Tags derived from the commit rather than listed explicitly
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DerivedTags {
    /// `{repository}:{sha}`
    pub default: Option<String>,
    /// `{repository}:{prefix}-{sha}`
    pub prefixed: Option<String>,
}

impl DerivedTags {
    /// Derive the tags `inputs` ask for.
    ///
    /// `sha` is required unless the default tag is skipped, and `prefix`
    /// whenever the prefixed tag is wanted.
    pub fn derive(
        inputs: &Inputs,
        sha: Option<&str>,
        prefix: Option<&TagPrefix>,
    ) -> DockhandResult<Self> {
        if inputs.skip_default_tag {
            return Ok(Self::default());
        }

        let sha = sha.ok_or_else(|| {
            DockhandError::input("repository", "default tag needs the commit sha")
        })?;
        let default = Some(format!("{}:{}", inputs.repository, sha));

        let prefixed = if inputs.skip_tag_with_prefix {
            None
        } else {
            let prefix = prefix.ok_or_else(|| {
                DockhandError::TagPrefix("prefixed tag requested without CI event".to_string())
            })?;
            Some(format!("{}:{}", inputs.repository, prefix.render(sha)))
        };

        Ok(Self { default, prefixed })
    }
}

/// The `docker buildx build` invocation for one job.
///
/// Built once, then run through [`BuildPlan::command`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPlan {
    args: Vec<String>,
    output_tag: String,
}

impl BuildPlan {
    pub fn assemble(
        inputs: &Inputs,
        tags: &DerivedTags,
        cache: &CacheConfig,
    ) -> DockhandResult<Self> {
        let output_tag = tags
            .default
            .clone()
            .or_else(|| inputs.tags.first().cloned())
            .ok_or_else(|| {
                DockhandError::input(
                    "tags",
                    "No image tags specified. Default tag disabled and no tags specified",
                )
            })?;

        let mut args: Vec<String> = vec!["buildx".into(), "build".into()];

        if let Some(file) = &inputs.file {
            args.extend(["--file".into(), file.clone()]);
        }
        for build_arg in &inputs.build_args {
            args.extend(["--build-arg".into(), build_arg.clone()]);
        }
        for tag in &inputs.tags {
            args.extend(["--tag".into(), tag.clone()]);
        }
        for label in &inputs.labels {
            args.extend(["--label".into(), label.clone()]);
        }
        for tag in tags.default.iter().chain(tags.prefixed.iter()) {
            args.extend(["--tag".into(), tag.clone()]);
        }
        if let Some(platform) = &inputs.platform {
            args.extend(["--platform".into(), platform.clone()]);
        }
        if inputs.push {
            args.push("--push".into());
        }
        if inputs.load {
            args.push("--load".into());
        }
        if inputs.cache {
            args.extend([
                "--cache-from".into(),
                format!("type=local,src={}", cache.path.display()),
                "--cache-to".into(),
                format!("type=local,dest={}", cache.new_path.display()),
            ]);
        }
        args.push(inputs.context.clone());

        Ok(Self { args, output_tag })
    }

    /// Arguments passed to `docker`
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Tag reported as the `image` output and inspected after a push
    pub fn output_tag(&self) -> &str {
        &self.output_tag
    }

    /// The build as a streamed `docker` command
    pub fn command(&self) -> CommandSpec {
        CommandSpec::new("docker", self.args.iter().cloned()).streaming()
    }
}
