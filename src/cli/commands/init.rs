//! Init and Config commands.

use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::config::{CONFIG_FILE_NAME, Settings};

/// Run init command - create configuration file.
pub fn run_init(path: Option<&Path>, force: bool) -> anyhow::Result<()> {
    let config_path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));

    let path = Settings::init_config_file(&config_path, force)?;
    println!("Created configuration file at: {}", path.display());
    println!("Edit the [sources] table to match your machines.");
    Ok(())
}

/// Run config command - display current configuration.
pub fn run_config(config: &Settings) -> anyhow::Result<()> {
    let toml_str = toml::to_string_pretty(config).context("failed to render configuration")?;
    println!("Current Configuration:");
    println!("{}", "=".repeat(50));
    println!("{toml_str}");

    if let Err(e) = config.validate() {
        eprintln!("Warning: {e}");
    }
    Ok(())
}
