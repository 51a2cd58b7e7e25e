//! evhub-sim entry point.

use clap::Parser;

use evhub_sim::cli::{self, Cli};
use evhub_sim::telemetry::init_tracing;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json)?;
    cli::run(cli)
}
