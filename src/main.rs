use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use feedbin_tools::cli::{App, Cli};
use feedbin_tools::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise info, or debug with --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("feedbin_tools={default_level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => Config::default_path()?,
    };
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let dry_run = cli.dry_run || config.dry_run || Config::dry_run_from_env();
    if dry_run {
        tracing::warn!("Dry run: no changes will be made");
    }

    App::new(config, dry_run).run(cli.command).await
}
