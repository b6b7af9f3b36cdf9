use std::path::PathBuf;
use thiserror::Error;

use crate::types::FormatKind;

/// Errors that can occur while fetching a blocklist over HTTP(S)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Every attempt ran into the per-attempt timeout, or the run deadline hit
    #[error("request timed out")]
    Timeout,

    /// Connection could not be established or broke mid-transfer
    #[error("source unreachable: {0}")]
    Unreachable(String),

    /// Remote answered with a 4xx status; never retried
    #[error("source rejected the request with status {status}")]
    ClientRejected {
        /// HTTP status code
        status: u16,
    },

    /// Remote kept answering with a 5xx status until retries ran out
    #[error("source failed with status {status} after all retries")]
    ServerRejected {
        /// HTTP status code of the last attempt
        status: u16,
    },
}

impl FetchError {
    /// Returns true if another attempt may succeed
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::Unreachable(_) | Self::ServerRejected { .. }
        )
    }

    /// Returns the HTTP status code if the remote answered at all
    #[must_use]
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::ClientRejected { status } | Self::ServerRejected { status } => Some(*status),
            _ => None,
        }
    }
}

/// Errors that can occur while turning a raw payload into a domain set
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    /// Payload was empty or whitespace only
    #[error("payload is empty")]
    EmptyInput,

    /// Payload had content but not a single line matched the format's grammar
    #[error("no line matches the {format} grammar")]
    Unparseable {
        /// Format the payload was expected to be in
        format: FormatKind,
    },
}

/// Why a single source did not contribute a domain set
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AcquireError {
    /// Fetching the payload failed
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// The payload could not be normalized
    #[error("normalize failed: {0}")]
    Normalize(#[from] NormalizeError),
}

/// Errors that can occur while merging provider results
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AggregateError {
    /// No provider produced a domain set; emitting a zone would unblock everything
    #[error("all {failed} sources failed")]
    AllSourcesFailed {
        /// Number of failed sources
        failed: usize,
    },

    /// The SOA serial cannot be increased any further
    #[error("zone serial {previous} cannot be incremented")]
    SerialExhausted {
        /// Serial of the previously published zone
        previous: u32,
    },
}

/// Errors that can occur while writing the zone artifact
#[derive(Error, Debug)]
pub enum RenderError {
    /// Writing, syncing or renaming the zone file failed
    #[error("failed to write zone file {}: {source}", path.display())]
    IoFailure {
        /// Path that was being written
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Startup errors: missing, unreadable or invalid configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read
    #[error("failed to read configuration {}: {source}", path.display())]
    Read {
        /// Path of the configuration file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid YAML/TOML for the settings schema
    #[error("failed to parse configuration {}: {message}", path.display())]
    Parse {
        /// Path of the configuration file
        path: PathBuf,
        /// Parser message
        message: String,
    },

    /// Configuration parsed but violates a constraint
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
