//! `rpz-updater check` - validate the configuration.

use anyhow::Result;
use std::process::ExitCode;

use super::Context;
use crate::output;

pub fn execute(ctx: &Context) -> Result<ExitCode> {
    let (path, settings) = ctx.settings()?;
    print!("{}", output::format_settings(&path, &settings, ctx.output_format)?);
    Ok(ExitCode::SUCCESS)
}
