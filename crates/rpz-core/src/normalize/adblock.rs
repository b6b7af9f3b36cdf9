//! Adblock Plus filter lists.
//!
//! Only `||domain^` blocking rules map onto DNS. Exception rules, cosmetic
//! rules and rules restricted by options or paths are recognised and skipped.

use super::{Extraction, Scope};

/// Options that do not restrict where a rule applies
const NEUTRAL_OPTIONS: &[&str] = &["important", "all", "document", "doc"];

pub(super) fn extract(text: &str, out: &mut Extraction) {
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('!') || line.starts_with('[') {
            continue;
        }
        out.data_line();

        if line.starts_with("@@") || is_cosmetic(line) {
            out.recognized();
            continue;
        }

        let Some(rule) = line.strip_prefix("||") else {
            continue;
        };
        out.recognized();

        let (pattern, options) = rule.split_once('$').unwrap_or((rule, ""));
        if !options.is_empty()
            && !options
                .split(',')
                .all(|opt| NEUTRAL_OPTIONS.contains(&opt.trim()))
        {
            continue;
        }

        let host = pattern
            .strip_suffix("^|")
            .or_else(|| pattern.strip_suffix('^'));
        if let Some(host) = host {
            out.add(host, Scope::Wildcard);
        }
    }
}

fn is_cosmetic(line: &str) -> bool {
    ["##", "#@#", "#?#", "#$#", "#%#"]
        .iter()
        .any(|marker| line.contains(marker))
}
