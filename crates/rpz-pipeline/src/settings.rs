//! Run configuration.
//!
//! Loaded once at startup from YAML or TOML and validated before any run
//! starts. A missing or invalid file is a startup failure.

use rpz_client::RetryConfig;
use rpz_core::{ConfigError, DomainName, SourceDescriptor};
use rpz_zone::ZoneConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Complete configuration of an rpz-updater installation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Blocklist sources, in report order.
    pub sources: Vec<SourceDescriptor>,

    /// HTTP fetch behaviour.
    #[serde(default)]
    pub fetch: FetchSettings,

    /// Concurrency and deadline.
    #[serde(default)]
    pub pipeline: PipelineSettings,

    /// Output zone.
    pub zone: ZoneConfig,

    /// Names that are never blocked.
    #[serde(default)]
    pub allowlist: Vec<String>,

    /// Log output of the binary.
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// HTTP fetch settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchSettings {
    /// Per-attempt timeout in seconds (default: 10).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries after the first attempt (default: 3).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First backoff delay in milliseconds (default: 500).
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Backoff ceiling in milliseconds (default: 30000).
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// User-Agent header.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Scheduling settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Upper bound on concurrent fetches (default: 8).
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Whole-run fetch deadline in seconds (default: 120).
    #[serde(default = "default_run_deadline_secs")]
    pub run_deadline_secs: u64,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Filter directive when `RUST_LOG` is unset (default: info).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format (default: text).
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            run_deadline_secs: default_run_deadline_secs(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl FetchSettings {
    /// Per-attempt timeout
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Retry policy for the HTTP fetcher
    #[must_use]
    pub const fn retry_config(&self) -> RetryConfig {
        RetryConfig::new()
            .max_retries(self.max_retries)
            .initial_backoff(Duration::from_millis(self.initial_backoff_ms))
            .max_backoff(Duration::from_millis(self.max_backoff_ms))
    }
}

impl PipelineSettings {
    /// Whole-run fetch deadline
    #[must_use]
    pub const fn run_deadline(&self) -> Duration {
        Duration::from_secs(self.run_deadline_secs)
    }
}

impl Settings {
    /// Load and validate settings from `path`.
    ///
    /// `.toml` files are parsed as TOML, everything else as YAML.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        let parsed: Result<Self, String> = if is_toml {
            toml::from_str(&content).map_err(|e| e.to_string())
        } else {
            serde_yaml::from_str(&content).map_err(|e| e.to_string())
        };
        let settings = parsed.map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })?;

        settings.validate()?;
        Ok(settings)
    }

    /// Check every constraint that must hold before a run starts
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.sources.iter().any(|s| s.enabled) {
            return Err(invalid("no enabled source configured"));
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            if source.id.trim().is_empty() {
                return Err(invalid(format!("source with url {} has an empty id", source.url)));
            }
            if !seen.insert(source.id.as_str()) {
                return Err(invalid(format!("duplicate source id '{}'", source.id)));
            }
            let url = Url::parse(&source.url)
                .map_err(|e| invalid(format!("source '{}': bad url: {e}", source.id)))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(invalid(format!(
                    "source '{}': unsupported scheme '{}'",
                    source.id,
                    url.scheme()
                )));
            }
            if let Some(origin) = &source.rpz_origin {
                DomainName::parse(origin).map_err(|e| {
                    invalid(format!("source '{}': bad rpz_origin: {e}", source.id))
                })?;
            }
        }

        if self.fetch.timeout_secs == 0 {
            return Err(invalid("fetch.timeout_secs must be greater than zero"));
        }
        if self.pipeline.max_concurrency == 0 {
            return Err(invalid("pipeline.max_concurrency must be greater than zero"));
        }
        if self.pipeline.run_deadline_secs == 0 {
            return Err(invalid("pipeline.run_deadline_secs must be greater than zero"));
        }

        let output = &self.zone.output_path;
        if output.as_os_str().is_empty() {
            return Err(invalid("zone.output_path is empty"));
        }
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.is_dir() {
                return Err(invalid(format!(
                    "zone.output_path directory {} does not exist",
                    parent.display()
                )));
            }
        }

        self.allowlist_names().map(|_| ())
    }

    /// Parsed allowlist entries
    pub fn allowlist_names(&self) -> Result<Vec<DomainName>, ConfigError> {
        self.allowlist
            .iter()
            .map(|raw| {
                DomainName::parse(raw)
                    .map_err(|e| invalid(format!("allowlist entry '{raw}': {e}")))
            })
            .collect()
    }

    /// Sources that will be fetched
    pub fn enabled_sources(&self) -> impl Iterator<Item = &SourceDescriptor> {
        self.sources.iter().filter(|s| s.enabled)
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(message.into())
}

const fn default_timeout_secs() -> u64 {
    10
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    500
}

const fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_user_agent() -> String {
    rpz_client::DEFAULT_USER_AGENT.to_string()
}

const fn default_max_concurrency() -> usize {
    8
}

const fn default_run_deadline_secs() -> u64 {
    120
}

fn default_log_level() -> String {
    String::from("info")
}
