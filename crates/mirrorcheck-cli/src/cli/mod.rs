//! CLI argument parsing and command dispatch.

pub mod args;
pub mod commands;

use anyhow::Result;
use args::{Cli, Commands};
use clap::Parser;

use crate::output::OutputFormat;

/// Run the CLI application.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    crate::logging::init(if cli.verbose { "debug" } else { "info" });
    if cli.no_color {
        colored::control::set_override(false);
    }

    let config_path = crate::config::resolve_path(cli.config.as_deref())?;
    let config = crate::config::load(&config_path)?;

    let ctx = commands::Context {
        config,
        config_path,
        output_format: cli.output.unwrap_or(OutputFormat::Pretty),
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Run(args) => commands::run::execute(ctx, args).await,
        Commands::Changes(args) => commands::changes::execute(ctx, args).await,
        Commands::Mirrors => commands::mirrors::execute(ctx).await,
        Commands::Fingerprint(args) => commands::fingerprint::execute(ctx, args).await,
        Commands::Vantage(args) => commands::vantage::execute(ctx, args).await,
        Commands::Config(args) => commands::config::execute(&ctx, args),
    }
}
