//! Zone file configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// RPZ policy applied to every blocked name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyAction {
    /// Answer NXDOMAIN (`CNAME .`)
    #[default]
    Nxdomain,
    /// Answer NODATA (`CNAME *.`)
    Nodata,
    /// Drop the query (`CNAME rpz-drop.`)
    Drop,
}

impl PolicyAction {
    /// Right-hand side of the policy record
    #[must_use]
    pub const fn target(self) -> &'static str {
        match self {
            Self::Nxdomain => ".",
            Self::Nodata => "*.",
            Self::Drop => "rpz-drop.",
        }
    }
}

impl fmt::Display for PolicyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Nxdomain => "nxdomain",
            Self::Nodata => "nodata",
            Self::Drop => "drop",
        })
    }
}

/// Where and how the zone file is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneConfig {
    /// Path of the published zone file.
    pub output_path: PathBuf,

    /// Default TTL for every record (default: 300).
    #[serde(default = "default_ttl")]
    pub ttl: u32,

    /// Primary name server in the SOA and NS records (default: localhost.).
    #[serde(default = "default_primary_ns")]
    pub primary_ns: String,

    /// Responsible mailbox in the SOA record (default: hostmaster.localhost.).
    #[serde(default = "default_hostmaster")]
    pub hostmaster: String,

    /// SOA refresh timer in seconds.
    #[serde(default = "default_refresh")]
    pub refresh: u32,

    /// SOA retry timer in seconds.
    #[serde(default = "default_retry")]
    pub retry: u32,

    /// SOA expire timer in seconds.
    #[serde(default = "default_expire")]
    pub expire: u32,

    /// SOA negative-caching TTL in seconds.
    #[serde(default = "default_minimum")]
    pub minimum: u32,

    /// Policy for blocked names (default: nxdomain).
    #[serde(default)]
    pub policy: PolicyAction,
}

impl ZoneConfig {
    /// Config with default SOA values writing to `output_path`
    #[must_use]
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
            ttl: default_ttl(),
            primary_ns: default_primary_ns(),
            hostmaster: default_hostmaster(),
            refresh: default_refresh(),
            retry: default_retry(),
            expire: default_expire(),
            minimum: default_minimum(),
            policy: PolicyAction::default(),
        }
    }

    /// Set the policy action
    #[must_use]
    pub const fn policy(mut self, policy: PolicyAction) -> Self {
        self.policy = policy;
        self
    }
}

const fn default_ttl() -> u32 {
    300
}

fn default_primary_ns() -> String {
    String::from("localhost.")
}

fn default_hostmaster() -> String {
    String::from("hostmaster.localhost.")
}

const fn default_refresh() -> u32 {
    3600
}

const fn default_retry() -> u32 {
    600
}

const fn default_expire() -> u32 {
    86_400
}

const fn default_minimum() -> u32 {
    300
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_config_defaults() {
        let config: ZoneConfig =
            serde_json::from_str(r#"{"output_path": "/var/lib/bind/rpz.db"}"#).unwrap();
        assert_eq!(config, ZoneConfig::new("/var/lib/bind/rpz.db"));
        assert_eq!(config.ttl, 300);
        assert_eq!(config.policy, PolicyAction::Nxdomain);
    }

    #[test]
    fn test_policy_targets() {
        let policy: PolicyAction = serde_json::from_str("\"drop\"").unwrap();
        assert_eq!(policy.target(), "rpz-drop.");
        assert_eq!(PolicyAction::Nodata.target(), "*.");
        assert_eq!(PolicyAction::Nxdomain.to_string(), "nxdomain");
    }
}
