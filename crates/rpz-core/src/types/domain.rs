use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// Rejected domain name
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid domain name '{name}': {reason}")]
pub struct InvalidDomainName {
    /// Input as given
    pub name: String,
    /// Rule that was violated
    pub reason: &'static str,
}

/// Top-level labels with this prefix belong to RPZ itself (`rpz-ip`,
/// `rpz-nsdname`, `rpz-nsip`, `rpz-client-ip`, `rpz-passthru`, ...). An owner
/// ending in one is a non-QNAME trigger or policy name, not a blockable domain.
const RPZ_RESERVED_PREFIX: &str = "rpz-";

const RPZ_RESERVED_REASON: &str = "top-level label is reserved for rpz triggers";

impl InvalidDomainName {
    /// Returns true if the name is well-formed but ends in an RPZ trigger label
    #[must_use]
    pub fn is_rpz_reserved(&self) -> bool {
        self.reason == RPZ_RESERVED_REASON
    }
}

/// A fully-qualified, lower-cased domain name stored with its trailing dot.
///
/// Names are ordered by reversed labels (`com.example.ads`), which groups a
/// domain with its subdomains and keeps rendered zones diff-friendly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DomainName(String);

impl DomainName {
    /// Maximum length of a name without the trailing dot
    pub const MAX_LEN: usize = 253;

    /// Maximum length of a single label
    pub const MAX_LABEL_LEN: usize = 63;

    /// Parse and canonicalize a domain name.
    ///
    /// Accepts an optional trailing dot and any ASCII case. Single-label names,
    /// names whose top-level label is numeric (bare IPv4 addresses) and names
    /// ending in an `rpz-` label are rejected.
    pub fn parse(raw: &str) -> Result<Self, InvalidDomainName> {
        let invalid = |reason| InvalidDomainName {
            name: raw.to_string(),
            reason,
        };

        let lowered = raw.trim().to_ascii_lowercase();
        let name = lowered.strip_suffix('.').unwrap_or(&lowered);

        if name.is_empty() {
            return Err(invalid("empty name"));
        }
        if name.len() > Self::MAX_LEN {
            return Err(invalid("name longer than 253 characters"));
        }

        let mut label_count = 0;
        let mut last = "";
        for label in name.split('.') {
            if label.is_empty() {
                return Err(invalid("empty label"));
            }
            if label.len() > Self::MAX_LABEL_LEN {
                return Err(invalid("label longer than 63 characters"));
            }
            if !label
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
            {
                return Err(invalid("label contains characters outside [a-z0-9-]"));
            }
            if label.starts_with('-') || label.ends_with('-') {
                return Err(invalid("label starts or ends with a hyphen"));
            }
            label_count += 1;
            last = label;
        }

        if label_count < 2 {
            return Err(invalid("single-label name"));
        }
        if last.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("numeric top-level label"));
        }
        if last.starts_with(RPZ_RESERVED_PREFIX) {
            return Err(invalid(RPZ_RESERVED_REASON));
        }

        Ok(Self(format!("{name}.")))
    }

    /// The name including its trailing dot
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The name without its trailing dot, as written relative to a zone origin
    #[must_use]
    pub fn relative(&self) -> &str {
        &self.0[..self.0.len() - 1]
    }

    /// Labels from left to right
    pub fn labels(&self) -> std::str::Split<'_, char> {
        self.relative().split('.')
    }

    /// Number of labels
    #[must_use]
    pub fn label_count(&self) -> usize {
        self.labels().count()
    }

    /// The enclosing domain, if it still has at least two labels
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.0.split_once('.')?;
        if rest.trim_end_matches('.').contains('.') {
            Some(Self(rest.to_string()))
        } else {
            None
        }
    }

    /// Returns true if `self` lies strictly below `other`
    #[must_use]
    pub fn is_subdomain_of(&self, other: &Self) -> bool {
        self.0.len() > other.0.len()
            && self.0.ends_with(&other.0)
            && self.0.as_bytes()[self.0.len() - other.0.len() - 1] == b'.'
    }
}

impl Ord for DomainName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.labels().rev().cmp(other.labels().rev())
    }
}

impl PartialOrd for DomainName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DomainName {
    type Error = InvalidDomainName;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DomainName> for String {
    fn from(name: DomainName) -> Self {
        name.0
    }
}

impl std::str::FromStr for DomainName {
    type Err = InvalidDomainName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A set of blocked domain names.
///
/// Every entry blocks its exact name unless marked subtree-only. Wildcard
/// entries additionally block everything below the name; subtree-only entries
/// are wildcards whose own name stays resolvable (`*.name` without `name`).
/// An empty set is a valid result and is distinct from a failed acquisition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DomainSet {
    names: BTreeSet<DomainName>,
    wildcards: BTreeSet<DomainName>,
    /// Subset of `wildcards` whose exact name is not blocked
    subtree_only: BTreeSet<DomainName>,
}

impl DomainSet {
    /// Create an empty set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Block the exact name. Returns true if it was not blocked before.
    pub fn insert(&mut self, name: DomainName) -> bool {
        let lifted = self.subtree_only.remove(&name);
        self.names.insert(name) || lifted
    }

    /// Block the name and everything below it. Returns true if the name was
    /// not yet marked as a wildcard.
    pub fn insert_wildcard(&mut self, name: DomainName) -> bool {
        self.insert(name.clone());
        self.wildcards.insert(name)
    }

    /// Block everything below the name but not the name itself, unless the
    /// name is already blocked. Returns true if the name was not yet marked
    /// as a wildcard.
    pub fn insert_subtree(&mut self, name: DomainName) -> bool {
        if self.names.insert(name.clone()) {
            self.subtree_only.insert(name.clone());
        }
        self.wildcards.insert(name)
    }

    /// Remove an entry and its marks. Returns true if it was present.
    pub fn remove(&mut self, name: &DomainName) -> bool {
        self.wildcards.remove(name);
        self.subtree_only.remove(name);
        self.names.remove(name)
    }

    /// Returns true if the exact name is blocked
    #[must_use]
    pub fn contains(&self, name: &DomainName) -> bool {
        self.names.contains(name) && !self.subtree_only.contains(name)
    }

    /// Parse `name` and check that it is blocked; invalid names never are
    #[must_use]
    pub fn contains_str(&self, name: &str) -> bool {
        DomainName::parse(name).is_ok_and(|n| self.contains(&n))
    }

    /// Returns true if the name has an entry, blocked exactly or subtree-only
    #[must_use]
    pub fn has_entry(&self, name: &DomainName) -> bool {
        self.names.contains(name)
    }

    /// Returns true if the name is marked as a wildcard entry
    #[must_use]
    pub fn is_wildcard(&self, name: &DomainName) -> bool {
        self.wildcards.contains(name)
    }

    /// Returns true if only the names below this one are blocked
    #[must_use]
    pub fn is_subtree_only(&self, name: &DomainName) -> bool {
        self.subtree_only.contains(name)
    }

    /// Returns true if the name or one of its ancestors is a wildcard entry
    #[must_use]
    pub fn is_covered_by_wildcard(&self, name: &DomainName) -> bool {
        let mut current = name.parent();
        while let Some(ancestor) = current {
            if self.wildcards.contains(&ancestor) {
                return true;
            }
            current = ancestor.parent();
        }
        false
    }

    /// Number of entries, wildcards included once
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Number of wildcard entries
    #[must_use]
    pub fn wildcard_count(&self) -> usize {
        self.wildcards.len()
    }

    /// Returns true if the set has no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Entries in reversed-label order
    pub fn iter(&self) -> impl Iterator<Item = &DomainName> {
        self.names.iter()
    }

    /// Wildcard names in reversed-label order
    pub fn wildcards(&self) -> impl Iterator<Item = &DomainName> {
        self.wildcards.iter()
    }

    /// Add every entry of `other`, keeping wildcard marks. A name blocked
    /// exactly by either side stays blocked exactly.
    pub fn union_with(&mut self, other: &Self) {
        for name in &other.names {
            if other.is_subtree_only(name) {
                self.insert_subtree(name.clone());
            } else if other.is_wildcard(name) {
                self.insert_wildcard(name.clone());
            } else {
                self.insert(name.clone());
            }
        }
    }
}

impl<'a> IntoIterator for &'a DomainSet {
    type Item = &'a DomainName;
    type IntoIter = std::collections::btree_set::Iter<'a, DomainName>;

    fn into_iter(self) -> Self::IntoIter {
        self.names.iter()
    }
}
