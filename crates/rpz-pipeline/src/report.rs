//! Structured result of one pipeline run.

use chrono::{DateTime, Utc};
use rpz_core::{ProviderResult, SourceDescriptor};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Orchestrator state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Constructed, not started
    Idle,
    /// Providers are acquiring
    Fetching,
    /// Merging provider results
    Aggregating,
    /// Writing the zone file
    Rendering,
    /// Zone published
    Done,
    /// Run aborted; the previous zone is untouched
    Failed,
}

impl RunState {
    /// Returns true for `Done` and `Failed`
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Whether the state machine allows moving to `next`
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Fetching)
                | (Self::Fetching, Self::Aggregating)
                | (Self::Aggregating | Self::Rendering, Self::Failed)
                | (Self::Aggregating, Self::Rendering)
                | (Self::Rendering, Self::Done)
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Aggregating => "aggregating",
            Self::Rendering => "rendering",
            Self::Done => "done",
            Self::Failed => "failed",
        })
    }
}

/// How a single source ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    /// Contributed a domain set (possibly empty)
    Succeeded,
    /// Fetch or normalize failed
    Failed,
    /// Disabled in configuration, never fetched
    Disabled,
}

/// Per-source line of the run report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    /// Source identifier
    pub id: String,
    /// Configured trust tier
    pub trust_tier: u8,
    /// Outcome
    pub status: SourceStatus,
    /// HTTP attempts made
    pub attempts: u32,
    /// Names contributed, on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domains: Option<usize>,
    /// Failure reason, on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SourceReport {
    pub(crate) fn from_result(result: &ProviderResult) -> Self {
        Self {
            id: result.source_id().to_string(),
            trust_tier: result.trust_tier(),
            status: if result.is_success() {
                SourceStatus::Succeeded
            } else {
                SourceStatus::Failed
            },
            attempts: result.attempt_count(),
            domains: result.domain_set().map(rpz_core::DomainSet::len),
            error: result.error().map(ToString::to_string),
        }
    }

    pub(crate) fn disabled(source: &SourceDescriptor) -> Self {
        Self {
            id: source.id.clone(),
            trust_tier: source.trust_tier,
            status: SourceStatus::Disabled,
            attempts: 0,
            domains: None,
            error: None,
        }
    }
}

/// Outcome of one run, returned to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Identifier stamped on every event of the run
    pub run_id: Uuid,
    /// Terminal state
    pub state: RunState,
    /// Wall-clock start of the run
    pub started_at: DateTime<Utc>,
    /// Run duration in milliseconds
    pub elapsed_ms: u64,
    /// Per-source outcomes in configuration order
    pub sources: Vec<SourceReport>,
    /// Enabled sources that were acquired
    pub attempted: usize,
    /// Sources that contributed a domain set
    pub succeeded: usize,
    /// Sources that failed
    pub failed: usize,
    /// Names in the final zone
    pub domains: usize,
    /// Wildcard entries in the final zone
    pub wildcards: usize,
    /// Names removed by the allowlist
    pub allowlisted: usize,
    /// Passthrough records emitted for allowlisted names
    pub passthrough: usize,
    /// Serial of the zone found at the output path
    pub previous_serial: Option<u32>,
    /// Serial of the new zone, once assigned
    pub serial: Option<u32>,
    /// Zone file path
    pub output_path: PathBuf,
    /// Policy records written, once rendered
    pub records: Option<usize>,
    /// Cause of a failed run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunReport {
    /// Returns true if the zone was published
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.state == RunState::Done
    }

    /// Process exit code for this report: 0 when done, 1 when failed
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(!self.is_success())
    }

    /// Sources that failed, in configuration order
    pub fn failed_sources(&self) -> impl Iterator<Item = &SourceReport> {
        self.sources
            .iter()
            .filter(|s| s.status == SourceStatus::Failed)
    }
}
