// Binary entry point for streamgate-cli

mod args;
mod commands;
mod config;
mod constants;
mod output;
mod spinner;

use anyhow::Result;
use args::Cli;
use clap::Parser;
use commands::Commands;
use config::CliConfig;
use output::OutputLevel;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        output::error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

/// Parse CLI arguments, load configuration and dispatch to the requested
/// sub-command.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    let output_level = OutputLevel::from_flags(cli.quiet, cli.verbose);
    output::init_logging(output_level);

    // Replay needs no configuration, so it works without a config directory
    if let Commands::Replay(args) = &cli.command {
        return args.run(output_level).await;
    }

    let cli_config = CliConfig::load(cli.config.as_deref())?;
    tracing::debug!(path = %cli_config.config_path.display(), "Loaded configuration");

    match &cli.command {
        Commands::Relay(args) => args.run(output_level, &cli_config).await?,
        Commands::Limit(args) => args.run(output_level, &cli_config).await?,
        Commands::Info(args) => args.run(output_level, &cli_config).await?,
        Commands::Replay(_) => {}
    }

    Ok(())
}
