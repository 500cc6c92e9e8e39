//! forum-relay command line tool

mod cli;
mod commands;

use clap::Parser;
use forum_relay_core::{config, telemetry, Environment};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    match cli.env_file() {
        Some(path) => config::load_dotenv_from(path),
        None => config::load_dotenv(),
    }
    telemetry::init_tracing(&Environment::current());

    cli.execute().await
}
