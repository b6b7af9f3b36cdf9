//! Plain domain lists: one name per line.

use super::{strip_comment, Extraction, Scope};

pub(super) fn extract(text: &str, out: &mut Extraction) {
    for line in text.lines() {
        let line = strip_comment(line, '#').trim();
        if line.is_empty() {
            continue;
        }
        out.data_line();

        if line.split_whitespace().nth(1).is_some() {
            continue;
        }

        let (name, scope) = if let Some(rest) = line.strip_prefix("*.") {
            (rest, Scope::Wildcard)
        } else if let Some(rest) = line.strip_prefix('.') {
            (rest, Scope::Wildcard)
        } else {
            (line, Scope::Exact)
        };

        if out.add(name, scope) {
            out.recognized();
        }
    }
}
