use serde::{Deserialize, Serialize};
use std::fmt;

/// Blocklist dialects understood by the normalizers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatKind {
    /// `/etc/hosts` style: `IP name [aliases...]`
    #[serde(alias = "hosts")]
    HostsFile,
    /// One domain per line
    #[serde(alias = "domains")]
    DomainList,
    /// Adblock Plus filter list, only `||domain^` rules are usable
    #[serde(alias = "abp", alias = "adblock")]
    AdblockPlus,
    /// An existing RPZ zone file
    #[serde(alias = "rpz")]
    RpzPassthrough,
}

impl FormatKind {
    /// All supported formats
    pub const ALL: [Self; 4] = [
        Self::HostsFile,
        Self::DomainList,
        Self::AdblockPlus,
        Self::RpzPassthrough,
    ];

    /// Canonical configuration name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HostsFile => "hosts_file",
            Self::DomainList => "domain_list",
            Self::AdblockPlus => "adblock_plus",
            Self::RpzPassthrough => "rpz_passthrough",
        }
    }
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static description of one upstream blocklist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Unique identifier, used for provenance and reporting
    pub id: String,

    /// HTTP(S) URL of the list
    pub url: String,

    /// Dialect of the list
    pub format: FormatKind,

    /// Disabled sources are skipped without being reported as failures
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Lower is more trusted; informational only, never removes entries
    #[serde(default)]
    pub trust_tier: u8,

    /// Policy zone suffix to strip from RPZ owner names
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpz_origin: Option<String>,
}

const fn default_true() -> bool {
    true
}

impl SourceDescriptor {
    /// Create an enabled descriptor with the default trust tier
    #[must_use]
    pub fn new(id: impl Into<String>, url: impl Into<String>, format: FormatKind) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            format,
            enabled: true,
            trust_tier: 0,
            rpz_origin: None,
        }
    }

    /// Set the trust tier
    #[must_use]
    pub const fn trust_tier(mut self, tier: u8) -> Self {
        self.trust_tier = tier;
        self
    }

    /// Set the RPZ origin used by the passthrough normalizer
    #[must_use]
    pub fn rpz_origin(mut self, origin: impl Into<String>) -> Self {
        self.rpz_origin = Some(origin.into());
        self
    }
}
