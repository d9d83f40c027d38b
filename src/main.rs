use anyhow::Result;
use clap::Parser;

use assetxfer_lib::bootstrap::init_tracing_subscriber;
use assetxfer_lib::cli::{self, Cli};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli::resolve_config(&cli.global)?;

    init_tracing_subscriber(config.log_dir.as_deref())?;
    tracing::debug!(?config, "configuration resolved");

    cli::run(cli.command, config)
}
