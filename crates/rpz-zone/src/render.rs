//! RPZ zone text rendering.

use rpz_core::{AggregatedZone, DomainName, EventEmitter, RenderError, ZoneArtifact};
use std::fmt::Write as _;
use std::fs::File;
use std::io::{self, Write as _};

use crate::config::ZoneConfig;
use crate::publish;
use crate::serial;

/// Target of an allowlist exemption record
const PASSTHRU: &str = "rpz-passthru.";

/// Serializes an [`AggregatedZone`] into an RPZ zone file.
///
/// Output depends only on the zone and the config: no timestamps, no
/// host-specific data. Records follow the reversed-label order of the
/// domain set.
#[derive(Debug, Clone)]
pub struct ZoneRenderer {
    config: ZoneConfig,
}

/// Rendered zone text before it is published
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedZone {
    /// Zone file bytes
    pub content: Vec<u8>,
    /// Number of policy records
    pub record_count: usize,
}

impl ZoneRenderer {
    /// Create a renderer for `config`
    #[must_use]
    pub const fn new(config: ZoneConfig) -> Self {
        Self { config }
    }

    /// Zone settings
    #[must_use]
    pub const fn config(&self) -> &ZoneConfig {
        &self.config
    }

    /// Serial of the zone currently published at the output path
    pub fn previous_serial(&self, events: &EventEmitter) -> Option<u32> {
        serial::read_previous_serial(&self.config.output_path, events)
    }

    /// Render the zone text without touching the filesystem
    #[must_use]
    pub fn render_text(&self, zone: &AggregatedZone) -> RenderedZone {
        let cfg = &self.config;
        let policy = cfg.policy.target();
        let mut out = String::new();
        let mut records = 0;

        let _ = writeln!(out, "$TTL {}", cfg.ttl);
        let _ = writeln!(
            out,
            "@ IN SOA {} {} ( {} {} {} {} {} )",
            absolute(&cfg.primary_ns),
            absolute(&cfg.hostmaster),
            zone.serial(),
            cfg.refresh,
            cfg.retry,
            cfg.expire,
            cfg.minimum,
        );
        let _ = writeln!(out, "@ IN NS {}", absolute(&cfg.primary_ns));
        out.push('\n');

        let domains = zone.domains();
        for name in domains {
            if !domains.is_subtree_only(name) {
                let _ = writeln!(out, "{} CNAME {policy}", owner(name));
                records += 1;
            }
            if domains.is_wildcard(name) {
                let _ = writeln!(out, "*.{} CNAME {policy}", owner(name));
                records += 1;
            }
        }

        if !zone.passthrough().is_empty() {
            out.push_str("\n; allowlisted\n");
            for name in zone.passthrough() {
                let _ = writeln!(out, "{} CNAME {PASSTHRU}", owner(name));
                records += 1;
            }
        }

        RenderedZone {
            content: out.into_bytes(),
            record_count: records,
        }
    }

    /// Render `zone` and publish it atomically at the output path
    pub fn render(&self, zone: &AggregatedZone) -> Result<ZoneArtifact, RenderError> {
        self.render_with(zone, |file, bytes| file.write_all(bytes))
    }

    /// Like [`render`](Self::render), with a custom writer for the temporary file
    pub fn render_with<W>(&self, zone: &AggregatedZone, write: W) -> Result<ZoneArtifact, RenderError>
    where
        W: FnOnce(&mut File, &[u8]) -> io::Result<()>,
    {
        let rendered = self.render_text(zone);
        publish::write_atomically_with(&self.config.output_path, &rendered.content, write)?;

        Ok(ZoneArtifact {
            path: self.config.output_path.clone(),
            content: rendered.content,
            serial: zone.serial(),
            record_count: rendered.record_count,
        })
    }
}

/// Owner name relative to the policy zone apex
fn owner(name: &DomainName) -> &str {
    name.relative()
}

fn absolute(name: &str) -> String {
    if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{name}.")
    }
}
