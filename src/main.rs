use std::path::Path;

use anyhow::Context;
use clap::Parser;

use nvrelay::Settings;
use nvrelay::cli::commands;
use nvrelay::cli::{Cli, Commands};
use nvrelay::logging;

/// Configuration problems are the only reason the relay refuses to start.
fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    match path {
        Some(path) => Settings::load_from(path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None => Settings::load().context("failed to load configuration"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init { force, path } => {
            logging::init();
            commands::init::run_init(path.as_deref(), force)
        }
        Commands::Parse { file, source, json } => {
            logging::init();
            commands::parse::run(&file, source.as_deref(), json).await
        }
        Commands::Config => {
            let settings = load_settings(cli.config.as_deref())?;
            logging::init_with_config(&settings.logging);
            commands::init::run_config(&settings)
        }
        Commands::Run { no_baseline } => {
            let settings = load_settings(cli.config.as_deref())?;
            logging::init_with_config(&settings.logging);
            settings.validate().context("invalid configuration")?;
            commands::run::run(settings, no_baseline).await
        }
    }
}
