//! Classify command - show how a repository address is handled

use crate::cli::args::ClassifyArgs;
use crate::config::Config;
use crate::error::DockhandResult;
use crate::registry;
use crate::ui::{self, UiContext};

/// Execute the classify command
pub async fn execute(args: ClassifyArgs, config: &Config) -> DockhandResult<()> {
    let ctx = UiContext::detect();
    let registry = registry::classify(&args.repository)?;

    ui::key_value(&ctx, "kind", registry.kind());
    ui::key_value(&ctx, "login host", &registry.login_host());
    ui::key_value(&ctx, "repository", registry.repo_path());
    let credentials = if registry.is_ecr() {
        "aws cli"
    } else {
        "username/password"
    };
    ui::key_value(&ctx, "credentials", credentials);
    if let Some(region) = registry.region(&config.ecr) {
        ui::key_value(&ctx, "region", &region);
    }

    Ok(())
}
