use anyhow::{Context, Result};
use clap::Parser;
use kiln_solve::EngineConfig;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};

mod build;
mod cli;

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let config = EngineConfig::load(cli.config.as_deref()).context("loading configuration failed")?;

    let runtime = tokio::runtime::Runtime::new().context("starting async runtime failed")?;
    let result = runtime.block_on(async {
        match cli.command {
            Command::Build(args) => build::run(args, config).await,
        }
    });
    // An interrupted stdin read may still hold a blocking thread.
    runtime.shutdown_background();
    result
}
