use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use crate::types::{DomainName, DomainSet, SourceFailure};

/// The merged, zone-ready result of one run.
///
/// Built wholesale by [`Aggregator`](crate::Aggregator) and never mutated
/// afterwards.
#[derive(Debug, Clone)]
pub struct AggregatedZone {
    pub(crate) domains: DomainSet,
    pub(crate) provenance: BTreeMap<DomainName, BTreeSet<String>>,
    pub(crate) passthrough: BTreeSet<DomainName>,
    pub(crate) serial: u32,
    pub(crate) failures: Vec<SourceFailure>,
    pub(crate) allowlisted: usize,
}

impl AggregatedZone {
    /// Blocked names
    #[must_use]
    pub const fn domains(&self) -> &DomainSet {
        &self.domains
    }

    /// Source ids that listed `name`
    #[must_use]
    pub fn provenance(&self, name: &DomainName) -> Option<&BTreeSet<String>> {
        self.provenance.get(name)
    }

    /// Full provenance map
    #[must_use]
    pub const fn provenance_map(&self) -> &BTreeMap<DomainName, BTreeSet<String>> {
        &self.provenance
    }

    /// Allowlisted names that sit below a blocked wildcard and need an
    /// explicit passthrough record
    #[must_use]
    pub const fn passthrough(&self) -> &BTreeSet<DomainName> {
        &self.passthrough
    }

    /// SOA serial for this zone
    #[must_use]
    pub const fn serial(&self) -> u32 {
        self.serial
    }

    /// Sources that did not contribute
    #[must_use]
    pub fn failures(&self) -> &[SourceFailure] {
        &self.failures
    }

    /// Number of names removed by the allowlist
    #[must_use]
    pub const fn allowlisted(&self) -> usize {
        self.allowlisted
    }
}

/// A zone file that has been published
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneArtifact {
    /// Final path of the zone file
    pub path: PathBuf,
    /// Exact bytes written
    pub content: Vec<u8>,
    /// SOA serial of the zone
    pub serial: u32,
    /// Number of policy records (blocks, wildcards, passthroughs)
    pub record_count: usize,
}
