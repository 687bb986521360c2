mod args;
mod menu;
mod runner;

use anyhow::Result;
use clap::Parser;
use dronewarden_common::{PROGNAME, VERSION};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use args::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    info!("Starting {} v{}", PROGNAME, VERSION);
    runner::run(cli).await
}

fn init_logging(verbose: u8) {
    let log_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    fmt()
        .with_env_filter(filter)
        .compact()
        .init();
}
