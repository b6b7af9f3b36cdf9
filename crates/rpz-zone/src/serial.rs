//! Reading the SOA serial of the currently published zone.

use rpz_core::{EventEmitter, Level, Phase};
use std::io::ErrorKind;
use std::path::Path;

/// Serial of the zone file at `path`.
///
/// A missing file yields `None` silently. An unreadable file or one without
/// a parseable SOA record yields `None` with a warning event, so the next
/// serial falls back to the clock.
pub fn read_previous_serial(path: &Path, events: &EventEmitter) -> Option<u32> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return None,
        Err(e) => {
            events
                .event(Phase::Rendering, Level::Warn, "previous zone unreadable")
                .field("path", path.display().to_string())
                .field("error", e.to_string())
                .emit();
            return None;
        }
    };

    let serial = parse_soa_serial(&text);
    if serial.is_none() {
        events
            .event(Phase::Rendering, Level::Warn, "previous zone has no SOA serial")
            .field("path", path.display().to_string())
            .emit();
    }
    serial
}

/// Extract the serial from the first SOA record in zone text
pub fn parse_soa_serial(text: &str) -> Option<u32> {
    let mut tokens = text
        .lines()
        .map(|line| line.split(';').next().unwrap_or_default())
        .flat_map(|line| {
            line.split(|c: char| c.is_whitespace() || c == '(' || c == ')')
                .filter(|t| !t.is_empty())
        });

    tokens.find(|t| t.eq_ignore_ascii_case("SOA"))?;
    // MNAME and RNAME precede the serial.
    tokens.nth(2)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpz_core::MemorySink;
    use std::sync::Arc;

    #[test]
    fn test_parse_single_line_soa() {
        let text = "$TTL 300\n@ IN SOA ns. admin. 2024010101 3600 600 86400 300\n";
        assert_eq!(parse_soa_serial(text), Some(2_024_010_101));
    }

    #[test]
    fn test_parse_multi_line_soa() {
        let text = "@ IN SOA localhost. hostmaster.localhost. (\n\
                    \x20   1700000042 ; serial\n\
                    \x20   3600 600 86400 300 )\n";
        assert_eq!(parse_soa_serial(text), Some(1_700_000_042));
    }

    #[test]
    fn test_parse_without_soa() {
        assert_eq!(parse_soa_serial("ads.example.com CNAME .\n"), None);
        assert_eq!(parse_soa_serial("@ SOA ns. admin. not-a-number 1 2 3 4\n"), None);
    }

    #[test]
    fn test_missing_file_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(MemorySink::default());
        let serial = read_previous_serial(
            &dir.path().join("absent.rpz"),
            &EventEmitter::new(sink.clone()),
        );
        assert_eq!(serial, None);
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_garbled_file_warns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbled.rpz");
        std::fs::write(&path, "this is not a zone\n").unwrap();

        let sink = Arc::new(MemorySink::default());
        let serial = read_previous_serial(&path, &EventEmitter::new(sink.clone()));
        assert_eq!(serial, None);
        assert_eq!(sink.events()[0].level, Level::Warn);
    }
}
