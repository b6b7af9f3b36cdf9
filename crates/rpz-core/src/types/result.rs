use crate::error::AcquireError;
use crate::types::DomainSet;

/// Outcome of acquiring one source.
///
/// Holds either a domain set or the error that prevented one, never both.
#[derive(Debug, Clone)]
pub struct ProviderResult {
    source_id: String,
    trust_tier: u8,
    attempt_count: u32,
    outcome: Result<DomainSet, AcquireError>,
}

impl ProviderResult {
    /// A source that produced a (possibly empty) domain set
    #[must_use]
    pub fn succeeded(
        source_id: impl Into<String>,
        trust_tier: u8,
        attempt_count: u32,
        domain_set: DomainSet,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            trust_tier,
            attempt_count,
            outcome: Ok(domain_set),
        }
    }

    /// A source that failed to fetch or normalize
    #[must_use]
    pub fn failed(
        source_id: impl Into<String>,
        trust_tier: u8,
        attempt_count: u32,
        error: impl Into<AcquireError>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            trust_tier,
            attempt_count,
            outcome: Err(error.into()),
        }
    }

    /// Identifier of the source
    #[must_use]
    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Trust tier of the source
    #[must_use]
    pub const fn trust_tier(&self) -> u8 {
        self.trust_tier
    }

    /// Number of HTTP attempts made
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// The domain set, present iff acquisition succeeded
    #[must_use]
    pub fn domain_set(&self) -> Option<&DomainSet> {
        self.outcome.as_ref().ok()
    }

    /// The error, present iff acquisition failed
    #[must_use]
    pub fn error(&self) -> Option<&AcquireError> {
        self.outcome.as_ref().err()
    }

    /// Returns true if the source contributed a domain set
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// A source that did not contribute to the zone, kept for the run report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFailure {
    /// Identifier of the source
    pub source_id: String,
    /// Why it failed
    pub error: AcquireError,
    /// Number of HTTP attempts made
    pub attempt_count: u32,
}
