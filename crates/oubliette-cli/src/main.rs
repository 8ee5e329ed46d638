//! Oubliette CLI entry point.

use clap::Parser;
use oubliette_cli::{init_logging, load_config, run, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Logging follows the config file unless OUBLIETTE_LOG overrides it
    let config = load_config(cli.config.as_deref());
    init_logging(&config, cli.verbose);

    run(cli, config).await
}
