//! CLI argument parsing

use crate::commands::{self, ConfigArgs, ReplayArgs};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

/// forum-relay - forward forum lifecycle events to an analytics ingestion API
#[derive(Parser, Debug)]
#[command(name = "forum-relay")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Load environment variables from this file instead of `.env`
    #[arg(long, global = true, value_name = "PATH")]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay JSON-lines host events through the hook registry
    Replay(ReplayArgs),

    /// Show the resolved relay configuration
    Config(ConfigArgs),
}

impl Cli {
    pub fn env_file(&self) -> Option<&Path> {
        self.env_file.as_deref()
    }

    /// Execute the CLI command
    pub async fn execute(self) -> anyhow::Result<()> {
        match self.command {
            Commands::Replay(args) => commands::replay(args).await,
            Commands::Config(args) => commands::show_config(args).await,
        }
    }
}
