//! Dockhand - container image build and publish pipeline
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use dockhand::cli::{Cli, Commands};
use dockhand::config::{Config, ConfigManager};
use dockhand::error::DockhandResult;
use dockhand::ui::{self, UiContext};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            ui::error(&UiContext::detect(), &e.to_string());
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> DockhandResult<()> {
    let cli = Cli::parse();

    // Load configuration
    let config_manager = if let Some(ref path) = cli.config {
        ConfigManager::with_path(path.clone())
    } else {
        ConfigManager::new()
    };
    let config = config_manager.load().await?;

    init_logging(cli.verbose, &config);
    tracing::debug!("Configuration: {}", config_manager.path().display());

    match cli.command {
        Commands::Run(args) => dockhand::cli::commands::run(*args, &config).await,
        Commands::Classify(args) => dockhand::cli::commands::classify(args, &config).await,
    }
}

/// 0 = info (the job log is the product), 1 = debug, 2+ = trace
fn init_logging(verbose: u8, config: &Config) {
    let filter = match verbose {
        0 => EnvFilter::new("dockhand=info"),
        1 => EnvFilter::new("dockhand=debug"),
        _ => EnvFilter::new("dockhand=trace"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time();

    if config.general.log_format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}
