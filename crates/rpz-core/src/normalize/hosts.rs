//! `/etc/hosts` style lists: `IP name [aliases...]`.

use std::net::IpAddr;

use super::{strip_comment, Extraction, Scope};

/// Names every hosts file carries for the local machine
const BOILERPLATE: &[&str] = &[
    "localhost",
    "localhost.localdomain",
    "local",
    "broadcasthost",
    "ip6-localhost",
    "ip6-loopback",
    "ip6-localnet",
    "ip6-mcastprefix",
    "ip6-allnodes",
    "ip6-allrouters",
    "ip6-allhosts",
    "0.0.0.0",
];

pub(super) fn extract(text: &str, out: &mut Extraction) {
    for line in text.lines() {
        let line = strip_comment(line, '#').trim();
        if line.is_empty() {
            continue;
        }
        out.data_line();

        let mut tokens = line.split_whitespace();
        let Some(address) = tokens.next() else {
            continue;
        };
        if !is_address(address) {
            continue;
        }

        // An address without names carries nothing to block.
        let mut names = tokens.peekable();
        if names.peek().is_none() {
            continue;
        }
        out.recognized();

        for name in names {
            if BOILERPLATE.iter().any(|b| b.eq_ignore_ascii_case(name)) {
                continue;
            }
            out.add(name, Scope::Exact);
        }
    }
}

/// IPv4 or IPv6 address, optionally with a `%zone` suffix
fn is_address(token: &str) -> bool {
    let address = token.split_once('%').map_or(token, |(addr, _)| addr);
    address.parse::<IpAddr>().is_ok()
}

#[cfg(test)]
mod tests {
    use crate::{normalize, FormatKind, NormalizeError};

    #[test]
    fn test_hosts_extracts_all_names() {
        let raw = b"0.0.0.0 ads.example.com\n\
                    127.0.0.1 tracker.example.net cdn.tracker.example.net # inline\n\
                    ::1 ipv6.example.org\n";
        let set = normalize(FormatKind::HostsFile, raw).unwrap();
        assert_eq!(set.len(), 4);
        assert!(set.contains_str("cdn.tracker.example.net"));
        assert!(set.contains_str("ipv6.example.org"));
        assert_eq!(set.wildcard_count(), 0);
    }

    #[test]
    fn test_hosts_skips_boilerplate() {
        let raw = b"# StevenBlack style header\n\
                    127.0.0.1 localhost\n\
                    127.0.0.1 localhost.localdomain\n\
                    255.255.255.255 broadcasthost\n\
                    ::1 localhost ip6-localhost ip6-loopback\n\
                    fe80::1%lo0 localhost\n\
                    0.0.0.0 0.0.0.0\n\
                    0.0.0.0 ads.example.com\n";
        let set = normalize(FormatKind::HostsFile, raw).unwrap();
        let names: Vec<&str> = set.iter().map(|n| n.relative()).collect();
        assert_eq!(names, vec!["ads.example.com"]);
    }

    #[test]
    fn test_hosts_boilerplate_only_is_empty_not_unparseable() {
        let raw = b"127.0.0.1 localhost\n::1 localhost\n";
        let set = normalize(FormatKind::HostsFile, raw).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_hosts_address_only_lines_do_not_match() {
        let raw = b"127.0.0.1\n0.0.0.0\n";
        assert_eq!(
            normalize(FormatKind::HostsFile, raw),
            Err(NormalizeError::Unparseable {
                format: FormatKind::HostsFile
            })
        );
    }

    #[test]
    fn test_domain_list_fed_as_hosts_is_unparseable() {
        let raw = b"ads.example.com\ntracker.example.net\n";
        assert!(matches!(
            normalize(FormatKind::HostsFile, raw),
            Err(NormalizeError::Unparseable { .. })
        ));
    }
}
