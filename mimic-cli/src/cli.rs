//! CLI parser.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "mimic")]
#[command(about = "Style learning CLI: import, prompt, stats, export, restore, clear", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file (JSON). Overrides MIMIC_CONFIG; defaults to ./config.json.
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Import a chat transcript and learn the style of one user.
    Import {
        #[arg(short, long)]
        user: String,
        #[arg(short, long)]
        session: String,
        #[arg(short, long)]
        file: PathBuf,
        /// Only learn from lines by this speaker.
        #[arg(long)]
        speaker: Option<String>,
    },
    /// Print the style prompt for a user in a session.
    Prompt {
        #[arg(short, long)]
        user: String,
        #[arg(short, long)]
        session: String,
        /// Imitation level in [0, 1]; defaults to style_application.default_imitation_level.
        #[arg(short, long)]
        level: Option<f64>,
    },
    /// Print engine and store statistics as JSON.
    Stats,
    /// Export committed profiles as JSON to stdout.
    Export {
        #[arg(short, long)]
        user: Option<String>,
    },
    /// Restore profiles from an export file.
    Restore {
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Delete learned data. Without filters everything is removed.
    Clear {
        #[arg(short, long)]
        user: Option<String>,
        #[arg(short, long)]
        session: Option<String>,
    },
}
