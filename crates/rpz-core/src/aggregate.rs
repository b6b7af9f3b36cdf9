//! Merging provider results into one zone-ready domain set.

use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};

use crate::error::AggregateError;
use crate::event::{EventEmitter, Level, Phase};
use crate::types::{AggregatedZone, DomainName, DomainSet, ProviderResult, SourceFailure};

/// Compute the SOA serial for the next zone.
///
/// `max(previous + 1, epoch_seconds)`, so the serial keeps increasing even
/// when the clock moves backwards or the previous serial was set by hand.
/// Without a previous zone the serial is `max(1, epoch_seconds)`.
pub fn next_serial(previous: Option<u32>, epoch_seconds: i64) -> Result<u32, AggregateError> {
    let clock = u32::try_from(epoch_seconds.max(0)).unwrap_or(u32::MAX);
    match previous {
        None => Ok(clock.max(1)),
        Some(previous) => previous
            .checked_add(1)
            .map(|bumped| bumped.max(clock))
            .ok_or(AggregateError::SerialExhausted { previous }),
    }
}

/// Merges provider results.
///
/// Block decisions only add up across sources; the allowlist is the only
/// way to take a name out again.
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    allowlist: BTreeSet<DomainName>,
    previous_serial: Option<u32>,
    clock: Option<i64>,
}

impl Aggregator {
    /// Aggregator with an empty allowlist and no previous serial
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Names to remove from the final set
    #[must_use]
    pub fn allowlist(mut self, names: impl IntoIterator<Item = DomainName>) -> Self {
        self.allowlist = names.into_iter().collect();
        self
    }

    /// Serial of the currently published zone
    #[must_use]
    pub const fn previous_serial(mut self, serial: Option<u32>) -> Self {
        self.previous_serial = serial;
        self
    }

    /// Fix the wall clock (seconds since the epoch) used for the serial
    #[must_use]
    pub const fn clock(mut self, epoch_seconds: i64) -> Self {
        self.clock = Some(epoch_seconds);
        self
    }

    /// Merge `results` into a fresh [`AggregatedZone`].
    ///
    /// Fails with [`AggregateError::AllSourcesFailed`] when no result carries
    /// a domain set, since an empty zone would unblock everything.
    pub fn aggregate(
        &self,
        results: &[ProviderResult],
        events: &EventEmitter,
    ) -> Result<AggregatedZone, AggregateError> {
        let mut domains = DomainSet::new();
        let mut provenance: BTreeMap<DomainName, BTreeSet<String>> = BTreeMap::new();
        let mut failures = Vec::new();

        for result in results {
            let Some(set) = result.domain_set() else {
                if let Some(error) = result.error() {
                    events
                        .event(Phase::Aggregating, Level::Warn, "source excluded")
                        .source(result.source_id())
                        .field("error", error.to_string())
                        .emit();
                    failures.push(SourceFailure {
                        source_id: result.source_id().to_string(),
                        error: error.clone(),
                        attempt_count: result.attempt_count(),
                    });
                }
                continue;
            };

            domains.union_with(set);
            for name in set {
                provenance
                    .entry(name.clone())
                    .or_default()
                    .insert(result.source_id().to_string());
            }
        }

        if failures.len() == results.len() {
            events
                .event(Phase::Aggregating, Level::Error, "all sources failed")
                .field("failed", failures.len())
                .emit();
            return Err(AggregateError::AllSourcesFailed {
                failed: failures.len(),
            });
        }

        let mut allowlisted = 0;
        let mut passthrough = BTreeSet::new();
        for name in &self.allowlist {
            if domains.remove(name) {
                provenance.remove(name);
                allowlisted += 1;
            }
            if domains.is_covered_by_wildcard(name) {
                passthrough.insert(name.clone());
            }
        }

        let clock = self.clock.unwrap_or_else(|| Utc::now().timestamp());
        let serial = next_serial(self.previous_serial, clock)?;

        events
            .event(Phase::Aggregating, Level::Info, "zone aggregated")
            .field("domains", domains.len())
            .field("wildcards", domains.wildcard_count())
            .field("sources_succeeded", results.len() - failures.len())
            .field("sources_failed", failures.len())
            .field("allowlisted", allowlisted)
            .field("passthrough", passthrough.len())
            .field("serial", serial)
            .emit();

        Ok(AggregatedZone {
            domains,
            provenance,
            passthrough,
            serial,
            failures,
            allowlisted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FetchError, NormalizeError};
    use crate::event::MemorySink;
    use crate::types::FormatKind;
    use std::sync::Arc;

    fn name(s: &str) -> DomainName {
        DomainName::parse(s).unwrap()
    }

    fn set_of(names: &[&str]) -> DomainSet {
        let mut set = DomainSet::new();
        for n in names {
            set.insert(name(n));
        }
        set
    }

    #[test]
    fn test_union_records_provenance() {
        let results = vec![
            ProviderResult::succeeded("a", 0, 1, set_of(&["example.com", "ads.test.net"])),
            ProviderResult::succeeded("b", 2, 1, set_of(&["example.com"])),
        ];
        let zone = Aggregator::new()
            .clock(1_700_000_000)
            .aggregate(&results, &EventEmitter::null())
            .unwrap();

        assert_eq!(zone.domains().len(), 2);
        let sources: Vec<&str> = zone
            .provenance(&name("example.com"))
            .unwrap()
            .iter()
            .map(String::as_str)
            .collect();
        assert_eq!(sources, vec!["a", "b"]);
        assert!(zone.failures().is_empty());
    }

    #[test]
    fn test_all_sources_failed() {
        let sink = Arc::new(MemorySink::default());
        let events = EventEmitter::new(sink.clone());
        let results = vec![
            ProviderResult::failed("a", 0, 4, FetchError::Timeout),
            ProviderResult::failed(
                "b",
                0,
                1,
                NormalizeError::Unparseable {
                    format: FormatKind::HostsFile,
                },
            ),
        ];
        let err = Aggregator::new().aggregate(&results, &events).unwrap_err();
        assert_eq!(err, AggregateError::AllSourcesFailed { failed: 2 });
        assert!(sink
            .events()
            .iter()
            .any(|e| e.level == Level::Error && e.message == "all sources failed"));
    }

    #[test]
    fn test_failures_are_recorded_not_dropped() {
        let results = vec![
            ProviderResult::succeeded("ok", 0, 1, DomainSet::new()),
            ProviderResult::failed("down", 0, 4, FetchError::ServerRejected { status: 503 }),
        ];
        let zone = Aggregator::new()
            .aggregate(&results, &EventEmitter::null())
            .unwrap();
        assert!(zone.domains().is_empty());
        assert_eq!(zone.failures().len(), 1);
        assert_eq!(zone.failures()[0].source_id, "down");
        assert_eq!(zone.failures()[0].attempt_count, 4);
    }

    #[test]
    fn test_allowlist_and_passthrough() {
        let mut set = set_of(&["ads.example.com", "news.example.org"]);
        set.insert_wildcard(name("tracker.net"));
        let results = vec![ProviderResult::succeeded("a", 0, 1, set)];

        let zone = Aggregator::new()
            .allowlist([name("news.example.org"), name("login.tracker.net")])
            .aggregate(&results, &EventEmitter::null())
            .unwrap();

        assert!(!zone.domains().contains_str("news.example.org"));
        assert!(zone.provenance(&name("news.example.org")).is_none());
        assert_eq!(zone.allowlisted(), 1);
        assert!(zone.passthrough().contains(&name("login.tracker.net")));
        assert!(!zone.passthrough().contains(&name("news.example.org")));
    }

    #[test]
    fn test_serial_policy() {
        assert_eq!(next_serial(None, 1_700_000_000), Ok(1_700_000_000));
        assert_eq!(next_serial(None, 0), Ok(1));
        assert_eq!(next_serial(Some(100), 1_700_000_000), Ok(1_700_000_000));
        // Stale clock: never move backwards.
        assert_eq!(next_serial(Some(100), 50), Ok(101));
        assert_eq!(next_serial(Some(1_800_000_000), 1_700_000_000), Ok(1_800_000_001));
        assert_eq!(
            next_serial(Some(u32::MAX), 1_700_000_000),
            Err(AggregateError::SerialExhausted { previous: u32::MAX })
        );
    }

    #[test]
    fn test_aggregate_uses_previous_serial() {
        let results = vec![ProviderResult::succeeded("a", 0, 1, set_of(&["x.example.com"]))];
        let zone = Aggregator::new()
            .previous_serial(Some(100))
            .clock(10)
            .aggregate(&results, &EventEmitter::null())
            .unwrap();
        assert_eq!(zone.serial(), 101);
    }
}
