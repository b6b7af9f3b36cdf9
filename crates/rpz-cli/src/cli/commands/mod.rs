//! Command implementations.

pub mod check;
pub mod run;

use anyhow::{Context as _, Result};
use rpz_pipeline::Settings;
use std::path::PathBuf;

use crate::config;
use crate::output::OutputFormat;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Configuration file given on the command line
    pub config_path: Option<PathBuf>,

    /// Output format
    pub output_format: OutputFormat,

    /// Verbose output
    pub verbose: bool,
}

impl Context {
    /// Resolve, load and validate the configuration.
    pub fn settings(&self) -> Result<(PathBuf, Settings)> {
        let path = config::resolve(self.config_path.as_deref())?;
        let settings = Settings::load(&path)
            .with_context(|| format!("cannot use configuration {}", path.display()))?;
        Ok((path, settings))
    }
}
