//! CLI argument definitions using clap derive
//!
//! Every job input can be given as a flag or through the `INPUT_<NAME>`
//! variable the CI host sets for action inputs.

use clap::builder::FalseyValueParser;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Dockhand - container image build and publish pipeline for CI jobs
///
/// Runs twice per job: the first invocation logs in, restores the build
/// cache, and builds; the second saves the cache and cleans up.
#[derive(Parser, Debug)]
#[command(name = "dockhand")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "DOCKHAND_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the pipeline phase that is due (main on first call, post on second)
    Run(Box<RunArgs>),

    /// Show how a repository address is classified
    Classify(ClassifyArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Image repository, e.g. org/app or 123456789012.dkr.ecr.eu-west-1.amazonaws.com/app
    #[arg(long, env = "INPUT_REPOSITORY")]
    pub repository: Option<String>,

    /// Registry username (ignored for ECR)
    #[arg(long, env = "INPUT_USERNAME", hide_env_values = true)]
    pub username: Option<String>,

    /// Registry password (ignored for ECR)
    #[arg(long, env = "INPUT_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Extra registries to log into (user:password@host)
    #[arg(long = "registry-login", env = "INPUT_REGISTRIES", hide_env_values = true)]
    pub registries: Vec<String>,

    /// Build context path
    #[arg(long, env = "INPUT_CONTEXT", default_value = ".")]
    pub context: String,

    /// Path to the Dockerfile
    #[arg(long, env = "INPUT_FILE")]
    pub file: Option<String>,

    /// Build arguments (KEY=VALUE)
    #[arg(long = "build-arg", env = "INPUT_BUILD-ARGS")]
    pub build_args: Vec<String>,

    /// Additional image tags
    #[arg(long = "tag", env = "INPUT_TAGS")]
    pub tags: Vec<String>,

    /// Image labels (KEY=VALUE)
    #[arg(long = "label", env = "INPUT_LABELS")]
    pub labels: Vec<String>,

    /// Push the image after building
    #[arg(long, env = "INPUT_PUSH", value_parser = FalseyValueParser::new())]
    pub push: bool,

    /// Load the image into the local docker image store
    #[arg(long, env = "INPUT_LOAD", value_parser = FalseyValueParser::new())]
    pub load: bool,

    /// Target platforms, e.g. linux/amd64,linux/arm64
    #[arg(long, env = "INPUT_PLATFORM")]
    pub platform: Option<String>,

    /// Use an existing buildx builder instead of creating one
    #[arg(long, env = "INPUT_BUILDER")]
    pub builder: Option<String>,

    /// Restore and save the buildx layer cache
    #[arg(long, env = "INPUT_CACHE", value_parser = FalseyValueParser::new())]
    pub cache: bool,

    /// Prefix of the cache key
    #[arg(long, env = "INPUT_CACHE-KEY", default_value = "buildx")]
    pub cache_key: String,

    /// Do not tag the image with the commit SHA
    #[arg(long, env = "INPUT_SKIP-DEFAULT-TAG", value_parser = FalseyValueParser::new())]
    pub skip_default_tag: bool,

    /// Do not add the event-prefixed SHA tag
    #[arg(long, env = "INPUT_SKIP-TAG-WITH-PREFIX", value_parser = FalseyValueParser::new())]
    pub skip_tag_with_prefix: bool,

    /// Only log into registries, skip building
    #[arg(long, env = "INPUT_AUTH-ONLY", value_parser = FalseyValueParser::new())]
    pub auth_only: bool,

    /// Install QEMU emulators for cross-platform builds
    #[arg(long, env = "INPUT_QEMU", value_parser = FalseyValueParser::new())]
    pub qemu: bool,

    /// Default branch name when the event payload does not carry one
    #[arg(long, env = "INPUT_DEFAULT-BRANCH")]
    pub default_branch: Option<String>,

    /// Keep job state in this JSON file instead of the host's state store
    #[arg(long, env = "DOCKHAND_STATE_FILE")]
    pub state_file: Option<PathBuf>,
}

/// Arguments for the classify command
#[derive(Parser, Debug)]
pub struct ClassifyArgs {
    /// Repository address to classify
    pub repository: String,
}
