//! CLI argument parsing and command dispatch.

pub mod args;
pub mod commands;

use anyhow::Result;
use args::{Cli, Commands};
use clap::Parser;
use std::process::ExitCode;

/// Exit code of a run that ended in `Failed`
pub const EXIT_FAILED: u8 = 1;

/// Exit code for configuration and startup errors
pub const EXIT_STARTUP: u8 = 2;

/// Run the CLI application.
///
/// Errors returned here are startup failures; a failed pipeline run is
/// reported through the exit code instead.
pub async fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let ctx = commands::Context {
        config_path: cli.config,
        output_format: cli.output,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Run => commands::run::execute(ctx).await,
        Commands::Check => commands::check::execute(&ctx),
    }
}
