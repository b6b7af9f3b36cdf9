//! Command-line argument definitions using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::output::OutputFormat;

/// Build a BIND response policy zone from remote blocklists
///
/// Fetches every configured blocklist, merges them into one deduplicated set
/// and atomically replaces the zone file. Meant to be run from cron; the
/// name server reload is left to the caller.
#[derive(Parser, Debug)]
#[command(name = "rpz-updater")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file (default: $RPZ_UPDATER_CONFIG, then config.yml next to the binary)
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    /// Log at debug level, overriding the configured level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Fetch all sources and publish the zone
    Run,

    /// Validate the configuration and list the sources
    Check,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "rpz-updater",
            "run",
            "--config",
            "/etc/rpz-updater/config.yml",
            "-o",
            "json",
            "-v",
        ])
        .unwrap();
        assert_eq!(cli.command, Commands::Run);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/rpz-updater/config.yml")));
        assert_eq!(cli.output, OutputFormat::Json);
        assert!(cli.verbose);
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["rpz-updater", "check"]).unwrap();
        assert_eq!(cli.command, Commands::Check);
        assert_eq!(cli.config, None);
        assert_eq!(cli.output, OutputFormat::Text);
        assert!(!cli.verbose);
    }
}
