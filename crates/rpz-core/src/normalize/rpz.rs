//! Existing RPZ zone files.
//!
//! The policy zone apex is taken from the configured origin, else the first
//! `$ORIGIN`, else the SOA owner. Owner names have the apex stripped to
//! recover the blocked name.

use super::{Extraction, Scope};
use crate::types::DomainName;

const RECORD_TYPES: &[&str] = &[
    "A", "AAAA", "CNAME", "TXT", "SOA", "NS", "MX", "PTR", "SRV", "DNAME", "CAA", "HTTPS",
    "SVCB", "NAPTR", "HINFO", "DS", "DNSKEY", "RRSIG", "NSEC", "NSEC3",
];

const CLASSES: &[&str] = &["IN", "CH", "HS", "CS"];

pub(super) fn extract(text: &str, origin: Option<&DomainName>, out: &mut Extraction) {
    let mut state = ZoneState {
        apex: origin.map(|o| o.as_str().to_string()),
        current_origin: None,
        last_owner: None,
    };

    for record in logical_records(text) {
        state.process(&record, out);
    }
}

struct ZoneState {
    /// Absolute apex of the policy zone, lower-case with trailing dot
    apex: Option<String>,
    /// Value of the most recent `$ORIGIN`
    current_origin: Option<String>,
    /// Owner of the previous record, for records that omit it
    last_owner: Option<String>,
}

impl ZoneState {
    fn process(&mut self, record: &LogicalRecord, out: &mut Extraction) {
        let Some(first) = record.tokens.first() else {
            return;
        };

        if first.starts_with('$') {
            self.directive(&record.tokens);
            return;
        }
        out.data_line();

        let (owner, rest) = if record.inherits_owner {
            match &self.last_owner {
                Some(owner) => (owner.clone(), &record.tokens[..]),
                None => return,
            }
        } else {
            (first.to_ascii_lowercase(), &record.tokens[1..])
        };

        let Some((rtype, rdata)) = split_type(rest) else {
            return;
        };
        out.recognized();
        self.last_owner = Some(owner.clone());

        let full_owner = self.absolute(&owner);
        match rtype.as_str() {
            "SOA" => {
                if self.apex.is_none() {
                    self.apex = full_owner;
                }
                return;
            }
            "NS" => return,
            _ => {}
        }
        if owner == "@" {
            return;
        }
        if rtype == "CNAME"
            && rdata
                .first()
                .is_some_and(|target| target.eq_ignore_ascii_case("rpz-passthru."))
        {
            return;
        }

        // IP, NSDNAME, NSIP and client-IP triggers end in an `rpz-` label
        // and are turned away by name validation.
        let Some(trigger) = self.trigger_name(&owner, full_owner.as_deref()) else {
            return;
        };

        // `*.name` blocks only what lies below `name`.
        match trigger.strip_prefix("*.") {
            Some(base) => out.add(base, Scope::Subtree),
            None => out.add(&trigger, Scope::Exact),
        };
    }

    fn directive(&mut self, tokens: &[String]) {
        if tokens[0].eq_ignore_ascii_case("$ORIGIN") {
            if let Some(origin) = tokens.get(1) {
                let mut origin = origin.to_ascii_lowercase();
                if !origin.ends_with('.') {
                    origin.push('.');
                }
                if self.apex.is_none() {
                    self.apex = Some(origin.clone());
                }
                self.current_origin = Some(origin);
            }
        }
    }

    /// Owner as an absolute name, if it can be resolved
    fn absolute(&self, owner: &str) -> Option<String> {
        if owner == "@" {
            return self.current_origin.clone().or_else(|| self.apex.clone());
        }
        if owner.ends_with('.') {
            return Some(owner.to_string());
        }
        self.current_origin
            .as_ref()
            .map(|origin| format!("{owner}.{origin}"))
    }

    /// The blocked name encoded by an owner, without its trailing dot
    fn trigger_name(&self, owner: &str, full_owner: Option<&str>) -> Option<String> {
        let Some(full) = full_owner else {
            // Relative owner with no known origin is already the trigger.
            return Some(owner.to_string());
        };
        match &self.apex {
            Some(apex) => full
                .strip_suffix(apex.as_str())
                .and_then(|name| name.strip_suffix('.'))
                .filter(|name| !name.is_empty())
                .map(str::to_string),
            None => Some(full.trim_end_matches('.').to_string()),
        }
    }
}

/// Skip optional TTL and class, return the upper-cased type and its rdata
fn split_type(tokens: &[String]) -> Option<(String, &[String])> {
    for (idx, token) in tokens.iter().enumerate().take(3) {
        let upper = token.to_ascii_uppercase();
        if RECORD_TYPES.contains(&upper.as_str()) {
            return Some((upper, &tokens[idx + 1..]));
        }
        if !(is_ttl(token) || CLASSES.contains(&upper.as_str())) {
            return None;
        }
    }
    None
}

fn is_ttl(token: &str) -> bool {
    token.starts_with(|c: char| c.is_ascii_digit())
        && token
            .chars()
            .all(|c| c.is_ascii_digit() || "smhdwSMHDW".contains(c))
}

/// One resource record or directive, with parentheses joined
#[derive(Debug, PartialEq, Eq)]
struct LogicalRecord {
    /// Line started with whitespace: owner is the previous record's
    inherits_owner: bool,
    tokens: Vec<String>,
}

fn logical_records(text: &str) -> Vec<LogicalRecord> {
    let mut records = Vec::new();
    let mut pending: Option<LogicalRecord> = None;
    let mut depth: usize = 0;

    for line in text.lines() {
        let (content, opens, closes) = clean_line(line);

        if pending.is_none() {
            if content.trim().is_empty() && opens == 0 {
                continue;
            }
            pending = Some(LogicalRecord {
                inherits_owner: line.starts_with([' ', '\t']),
                tokens: Vec::new(),
            });
        }
        if let Some(record) = pending.as_mut() {
            record
                .tokens
                .extend(content.split_whitespace().map(str::to_string));
        }

        depth = (depth + opens).saturating_sub(closes);
        if depth == 0 {
            records.extend(pending.take());
        }
    }
    records.extend(pending);
    records
}

/// Strip a `;` comment outside quotes and blank out parentheses
fn clean_line(line: &str) -> (String, usize, usize) {
    let mut content = String::with_capacity(line.len());
    let mut in_quotes = false;
    let (mut opens, mut closes) = (0, 0);

    for c in line.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                content.push(c);
            }
            ';' if !in_quotes => break,
            '(' if !in_quotes => {
                opens += 1;
                content.push(' ');
            }
            ')' if !in_quotes => {
                closes += 1;
                content.push(' ');
            }
            _ => content.push(c),
        }
    }
    (content, opens, closes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{normalize, FormatKind, NormalizeError, Normalizer};

    const ZONE: &str = "$TTL 300\n\
        @ IN SOA localhost. hostmaster.localhost. (\n\
        \x20   2024010101 ; serial\n\
        \x20   3600 600 86400 300 )\n\
        \x20 IN NS localhost.\n\
        ; blocked names\n\
        ads.example.com CNAME .\n\
        *.ads.example.com CNAME .\n\
        Tracker.Example.NET 300 IN CNAME *.\n\
        allowed.example.com CNAME rpz-passthru.\n\
        32.1.2.0.192.rpz-ip CNAME .\n\
        ns.bad.example.rpz-nsdname CNAME .\n\
        redirect.example.org A 10.0.0.1\n";

    #[test]
    fn test_rpz_relative_owners() {
        let set = normalize(FormatKind::RpzPassthrough, ZONE.as_bytes()).unwrap();
        let names: Vec<&str> = set.iter().map(DomainName::relative).collect();
        assert_eq!(
            names,
            vec!["ads.example.com", "tracker.example.net", "redirect.example.org"]
        );
        assert!(set.is_wildcard(&DomainName::parse("ads.example.com").unwrap()));
    }

    #[test]
    fn test_rpz_wildcard_owner_blocks_only_the_subtree() {
        let set = normalize(FormatKind::RpzPassthrough, b"*.cdn.example.com CNAME .\n").unwrap();
        let cdn = DomainName::parse("cdn.example.com").unwrap();
        assert!(!set.contains_str("cdn.example.com"));
        assert!(set.is_subtree_only(&cdn));
        assert!(set.is_covered_by_wildcard(&DomainName::parse("img.cdn.example.com").unwrap()));
    }

    #[test]
    fn test_rpz_absolute_owners_use_origin_directive() {
        let zone = "$ORIGIN rpz.local.\n\
            @ SOA ns. admin. 1 2 3 4 5\n\
            ads.example.com.rpz.local. CNAME .\n\
            tracker.example.net CNAME .\n\
            outside.example.org. CNAME .\n";
        let set = normalize(FormatKind::RpzPassthrough, zone.as_bytes()).unwrap();
        let names: Vec<&str> = set.iter().map(DomainName::relative).collect();
        assert_eq!(names, vec!["ads.example.com", "tracker.example.net"]);
    }

    #[test]
    fn test_rpz_apex_from_soa_owner() {
        let zone = "blocklist.rpz. 300 IN SOA ns. admin. 1 2 3 4 5\n\
            blocklist.rpz. NS ns.\n\
            ads.example.com.blocklist.rpz. CNAME .\n";
        let set = normalize(FormatKind::RpzPassthrough, zone.as_bytes()).unwrap();
        assert!(set.contains_str("ads.example.com"));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_rpz_configured_origin_wins() {
        let zone = "$ORIGIN other.zone.\nads.example.com.policy.test. CNAME .\n";
        let normalizer = Normalizer::new(FormatKind::RpzPassthrough)
            .with_rpz_origin(DomainName::parse("policy.test").unwrap());
        let set = normalizer.normalize(zone.as_bytes()).unwrap();
        assert!(set.contains_str("ads.example.com"));
    }

    #[test]
    fn test_rpz_unparseable() {
        assert_eq!(
            normalize(FormatKind::RpzPassthrough, b"ads.example.com\ntracker.net\n"),
            Err(NormalizeError::Unparseable {
                format: FormatKind::RpzPassthrough
            })
        );
    }

    #[test]
    fn test_logical_records_join_parentheses() {
        let records = logical_records("@ SOA a. b. ( 1\n 2 3 ; c\n 4 5 )\n  NS a.\n");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].tokens.len(), 9);
        assert!(!records[0].inherits_owner);
        assert!(records[1].inherits_owner);
    }
}
