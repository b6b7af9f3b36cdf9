//! Tracing subscriber setup.

use rpz_pipeline::{LogFormat, LoggingSettings};
use tracing_subscriber::EnvFilter;

/// Filter used for this process.
///
/// `--verbose` forces debug, otherwise `RUST_LOG` wins over the configured
/// level.
pub fn filter(settings: &LoggingSettings, verbose: bool) -> EnvFilter {
    if verbose {
        return EnvFilter::new("debug");
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.level))
}

/// Install the global subscriber. Logs go to stderr so stdout carries only
/// the report.
pub fn init(settings: &LoggingSettings, verbose: bool) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter(settings, verbose))
        .with_writer(std::io::stderr);

    let installed = match settings.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if let Err(e) = installed {
        eprintln!("warning: logging not initialised: {e}");
    }
}
