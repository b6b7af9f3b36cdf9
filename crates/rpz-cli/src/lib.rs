//! # rpz-cli
//!
//! The `rpz-updater` binary: a cron-friendly batch job that fetches the
//! configured blocklists, merges them, and publishes a BIND response policy
//! zone.
//!
//! ## Commands
//!
//! - **run**: execute one pipeline run and print the run report
//! - **check**: load and validate the configuration, list the sources
//!
//! ## Output
//!
//! Reports are printed as a short text summary or as JSON (`--output json`).

pub mod cli;
pub mod config;
pub mod logging;
pub mod output;

pub use cli::{run, EXIT_FAILED, EXIT_STARTUP};
