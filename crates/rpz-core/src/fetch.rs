//! The fetcher seam between the pipeline and the network.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::FetchError;
use crate::event::EventEmitter;
use crate::types::{RawPayload, SourceDescriptor};

/// Counts attempts made for one source.
///
/// Owned by the caller so the count survives a fetch that is cancelled by
/// the run deadline.
#[derive(Debug, Default)]
pub struct AttemptCounter(AtomicU32);

impl AttemptCounter {
    /// Create a counter at zero
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicU32::new(0))
    }

    /// Record a new attempt and return its 1-based number
    pub fn begin(&self) -> u32 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Attempts recorded so far
    #[must_use]
    pub fn get(&self) -> u32 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Retrieves the raw bytes of a blocklist
#[async_trait]
pub trait BlocklistFetcher: Send + Sync {
    /// Fetch `source`, recording each attempt in `attempts` and emitting one
    /// event per attempt.
    async fn fetch(
        &self,
        source: &SourceDescriptor,
        attempts: &AttemptCounter,
        events: &EventEmitter,
    ) -> Result<RawPayload, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_counter() {
        let counter = AttemptCounter::new();
        assert_eq!(counter.get(), 0);
        assert_eq!(counter.begin(), 1);
        assert_eq!(counter.begin(), 2);
        assert_eq!(counter.get(), 2);
    }
}
