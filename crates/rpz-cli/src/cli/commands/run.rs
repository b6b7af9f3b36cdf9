//! `rpz-updater run` - one batch run.

use anyhow::{Context as _, Result};
use rpz_core::TracingSink;
use rpz_pipeline::Pipeline;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

use super::Context;
use crate::cli::EXIT_FAILED;
use crate::{logging, output};

pub async fn execute(ctx: Context) -> Result<ExitCode> {
    let (path, settings) = ctx.settings()?;
    logging::init(&settings.logging, ctx.verbose);
    info!(config = %path.display(), sources = settings.sources.len(), "configuration loaded");

    let pipeline = Pipeline::from_settings(&settings, Arc::new(TracingSink))
        .context("cannot set up the pipeline")?;
    let report = pipeline.run().await;

    print!("{}", output::format_report(&report, ctx.output_format)?);

    if report.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_FAILED))
    }
}
