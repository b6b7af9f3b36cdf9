//! Output formatting for reports.

use clap::ValueEnum;
use colored::Colorize;
use rpz_pipeline::{RunReport, RunState, Settings, SourceReport, SourceStatus};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;

/// Available output formats.
#[derive(Debug, Clone, Copy, Default, ValueEnum, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Short human-readable summary
    #[default]
    Text,
    /// The full report as JSON
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Render a run report in `format`, newline-terminated
pub fn format_report(report: &RunReport, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)? + "\n"),
        OutputFormat::Text => Ok(report_text(report)),
    }
}

fn report_text(report: &RunReport) -> String {
    let mut out = String::new();

    let state = match report.state {
        RunState::Done => "done".green().bold(),
        _ => report.state.to_string().red().bold(),
    };
    let _ = writeln!(out, "{} {state} in {} ms", "Run".bold(), report.elapsed_ms);
    let _ = writeln!(out, "  {} {}", "run id:".bold(), report.run_id);
    let _ = writeln!(
        out,
        "  {} {} attempted, {} succeeded, {} failed",
        "sources:".bold(),
        report.attempted,
        report.succeeded,
        report.failed
    );

    for source in &report.sources {
        let _ = writeln!(out, "    {}", source_line(source));
    }

    if let Some(serial) = report.serial {
        let _ = writeln!(
            out,
            "  {} {} ({} wildcard, {} allowlisted, {} passthrough)",
            "domains:".bold(),
            report.domains,
            report.wildcards,
            report.allowlisted,
            report.passthrough
        );
        let previous = report
            .previous_serial
            .map_or_else(|| "none".to_string(), |p| p.to_string());
        let _ = writeln!(out, "  {} {serial} (previous {previous})", "serial:".bold());
    }

    match (report.records, &report.error) {
        (Some(records), _) => {
            let _ = writeln!(
                out,
                "  {} {} ({records} records)",
                "zone:".bold(),
                report.output_path.display()
            );
        }
        (None, Some(error)) => {
            let _ = writeln!(out, "  {} {error}", "error:".red().bold());
            let _ = writeln!(
                out,
                "  {} {} left unchanged",
                "zone:".bold(),
                report.output_path.display()
            );
        }
        (None, None) => {}
    }

    out
}

fn source_line(source: &SourceReport) -> String {
    match source.status {
        SourceStatus::Succeeded => format!(
            "{} {} {} domains, {} attempt(s)",
            "ok".green(),
            source.id,
            source.domains.unwrap_or_default(),
            source.attempts
        ),
        SourceStatus::Failed => format!(
            "{} {} {}, {} attempt(s)",
            "failed".red(),
            source.id,
            source.error.as_deref().unwrap_or("unknown error"),
            source.attempts
        ),
        SourceStatus::Disabled => format!("{} {}", "disabled".dimmed(), source.id),
    }
}

/// Render the validated configuration in `format`
pub fn format_settings(
    path: &Path,
    settings: &Settings,
    format: OutputFormat,
) -> anyhow::Result<String> {
    if format == OutputFormat::Json {
        let value = serde_json::json!({
            "config": path,
            "valid": true,
            "settings": settings,
        });
        return Ok(serde_json::to_string_pretty(&value)? + "\n");
    }

    let mut out = String::new();
    let _ = writeln!(out, "{} {} is valid", "Config".bold(), path.display());
    let _ = writeln!(out, "  {} {}", "zone:".bold(), settings.zone.output_path.display());
    let _ = writeln!(out, "  {} {}", "policy:".bold(), settings.zone.policy);
    let _ = writeln!(
        out,
        "  {} {} of {} enabled",
        "sources:".bold(),
        settings.enabled_sources().count(),
        settings.sources.len()
    );
    for source in &settings.sources {
        let marker = if source.enabled {
            "on ".green()
        } else {
            "off".dimmed()
        };
        let _ = writeln!(
            out,
            "    {marker} {} [{}, tier {}] {}",
            source.id, source.format, source.trust_tier, source.url
        );
    }
    if !settings.allowlist.is_empty() {
        let _ = writeln!(out, "  {} {}", "allowlist:".bold(), settings.allowlist.join(", "));
    }
    Ok(out)
}
