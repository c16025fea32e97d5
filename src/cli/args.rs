//! CLI argument parsing using clap.

use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Banknote counter to NVR relay
#[derive(Parser, Debug)]
#[command(
    name = "nvrelay",
    version = env!("CARGO_PKG_VERSION"),
    about = "Relay deposit reports from counting machines to NVR overlays",
    next_line_help = true,
    styles = clap_cargo_style()
)]
pub struct Cli {
    /// Path to a custom nvrelay.toml
    #[arg(short, long, global = true, env = "NVRELAY_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch every configured source until interrupted
    Run {
        /// Relay files already present at startup instead of skipping them
        #[arg(long)]
        no_baseline: bool,
    },

    /// Print the effective configuration
    Config,

    /// Write a sample configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,

        /// Where to write the file (defaults to ./nvrelay.toml)
        #[arg(long, value_name = "PATH")]
        path: Option<PathBuf>,
    },

    /// Parse one report and print the message that would be sent
    Parse {
        /// Report file to parse
        file: PathBuf,

        /// Source id for the first message line (defaults to the parent directory name)
        #[arg(short, long)]
        source: Option<String>,

        /// Print the parsed record as JSON instead
        #[arg(long)]
        json: bool,
    },
}
