//! ml-workspace - Main Entry Point

use clap::Parser;
use ml_workspace::cli::{self, Cli};
use ml_workspace::telemetry;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init_global(&cli.log_level)?;
    cli::execute(&cli)
}
