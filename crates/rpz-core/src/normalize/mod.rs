//! Blocklist normalizers.
//!
//! Each [`FormatKind`] has its own extraction rules; the shared rules
//! (lower-casing, trailing dot, label validation, deduplication) live in
//! [`DomainName::parse`] and [`DomainSet`].

mod adblock;
mod domain_list;
mod hosts;
mod rpz;

use tracing::debug;

use crate::error::NormalizeError;
use crate::types::{DomainName, DomainSet, FormatKind, SourceDescriptor};

/// Converts raw payload bytes into a [`DomainSet`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalizer {
    format: FormatKind,
    rpz_origin: Option<DomainName>,
}

impl Normalizer {
    /// Normalizer for `format` with default options
    #[must_use]
    pub const fn new(format: FormatKind) -> Self {
        Self {
            format,
            rpz_origin: None,
        }
    }

    /// Normalizer configured from a source descriptor
    #[must_use]
    pub fn for_source(source: &SourceDescriptor) -> Self {
        let rpz_origin = source
            .rpz_origin
            .as_deref()
            .and_then(|origin| DomainName::parse(origin).ok());
        Self {
            format: source.format,
            rpz_origin,
        }
    }

    /// Override the policy zone origin stripped from RPZ owner names
    #[must_use]
    pub fn with_rpz_origin(mut self, origin: DomainName) -> Self {
        self.rpz_origin = Some(origin);
        self
    }

    /// Format this normalizer handles
    #[must_use]
    pub const fn format(&self) -> FormatKind {
        self.format
    }

    /// Normalize `raw` into a domain set.
    ///
    /// Returns [`NormalizeError::EmptyInput`] for an empty or whitespace-only
    /// payload and [`NormalizeError::Unparseable`] when the payload has data
    /// lines but none of them fits the format.
    pub fn normalize(&self, raw: &[u8]) -> Result<DomainSet, NormalizeError> {
        let text = String::from_utf8_lossy(raw);
        let text = text.trim_start_matches('\u{feff}');
        if text.trim().is_empty() {
            return Err(NormalizeError::EmptyInput);
        }

        let mut extraction = Extraction::default();
        match self.format {
            FormatKind::HostsFile => hosts::extract(text, &mut extraction),
            FormatKind::DomainList => domain_list::extract(text, &mut extraction),
            FormatKind::AdblockPlus => adblock::extract(text, &mut extraction),
            FormatKind::RpzPassthrough => {
                rpz::extract(text, self.rpz_origin.as_ref(), &mut extraction);
            }
        }

        debug!(
            format = %self.format,
            data_lines = extraction.data_lines,
            recognized = extraction.recognized,
            rejected = extraction.rejected,
            domains = extraction.set.len(),
            "normalized payload"
        );

        if extraction.data_lines > 0 && extraction.recognized == 0 {
            return Err(NormalizeError::Unparseable {
                format: self.format,
            });
        }
        Ok(extraction.set)
    }
}

/// Normalize `raw` as `format` with default options
pub fn normalize(format: FormatKind, raw: &[u8]) -> Result<DomainSet, NormalizeError> {
    Normalizer::new(format).normalize(raw)
}

/// Accumulates extracted names and line statistics
#[derive(Debug, Default)]
struct Extraction {
    set: DomainSet,
    /// Lines that are neither blank, comments nor directives
    data_lines: usize,
    /// Data lines that matched the format's grammar
    recognized: usize,
    /// Names dropped by validation
    rejected: usize,
}

impl Extraction {
    fn data_line(&mut self) {
        self.data_lines += 1;
    }

    fn recognized(&mut self) {
        self.recognized += 1;
    }

    /// Validate and insert a name.
    ///
    /// Returns false if the name is malformed. RPZ trigger names are
    /// well-formed but never imported.
    fn add(&mut self, raw: &str, scope: Scope) -> bool {
        match DomainName::parse(raw) {
            Ok(name) => {
                match scope {
                    Scope::Exact => self.set.insert(name),
                    Scope::Wildcard => self.set.insert_wildcard(name),
                    Scope::Subtree => self.set.insert_subtree(name),
                };
                true
            }
            Err(err) => {
                self.rejected += 1;
                err.is_rpz_reserved()
            }
        }
    }
}

/// What an extracted entry blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    /// The name only
    Exact,
    /// The name and everything below it
    Wildcard,
    /// Everything below the name
    Subtree,
}

/// Cut a line at the first `marker`
fn strip_comment(line: &str, marker: char) -> &str {
    line.split_once(marker).map_or(line, |(content, _)| content)
}
