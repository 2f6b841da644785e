//! Line scanning for responses the field parser cannot make sense of.

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use super::layouts::parse_timestamp;

/// Matched case-insensitively anywhere in a line, in this order.
const EXPIRY_LABELS: &[&str] = &[
    "registry expiry date:",
    "registrar registration expiration date:",
    "expiry date:",
    "expiration date:",
    "expires:",
    "expiration time:",
    "registry expiry:",
    "domain expiration date:",
    "paid-till:",
    "expire:",
    "expires on:",
    "registration expiration date:",
    "domain expires:",
    "valid until:",
    "renewal date:",
    "record expires on",
    "[expires on]",
    "expiration:",
];

const REGISTRAR_LABELS: &[&str] = &["registrar:", "sponsoring registrar:", "registrar name:"];

static PARENTHETICAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\([^)]*\)").expect("Invalid parenthetical regex"));

static ZONE_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*\b(?:UTC|GMT)\b").expect("Invalid zone regex"));

static TRAILING_OFFSET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*[+-]\d{2}:?\d{2}$").expect("Invalid offset regex"));

/// Zone abbreviation wedged before the year, as in `Tue Aug 13 04:00:00 CEST 2030`.
static EMBEDDED_ZONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s[A-Z]{3,5}(\s\d{4})$").expect("Invalid embedded zone regex"));

#[derive(Debug, Clone, Copy)]
enum FieldOrder {
    Ymd,
    Mdy,
    Dmy,
}

static NUMERIC_PATTERNS: Lazy<Vec<(Regex, FieldOrder)>> = Lazy::new(|| {
    [
        (r"(\d{4})-(\d{1,2})-(\d{1,2})", FieldOrder::Ymd),
        (r"(\d{1,2})/(\d{1,2})/(\d{4})", FieldOrder::Mdy),
        (r"(\d{4})\.(\d{1,2})\.(\d{1,2})", FieldOrder::Ymd),
        (r"(\d{1,2})\.(\d{1,2})\.(\d{4})", FieldOrder::Dmy),
    ]
    .into_iter()
    .map(|(p, order)| (Regex::new(p).expect("Invalid numeric date regex"), order))
    .collect()
});

/// Scan every line for an expiry label and return the first value that
/// parses and passes `accept`.
pub fn scan_expiry<F>(raw: &str, accept: F) -> Option<DateTime<Utc>>
where
    F: Fn(DateTime<Utc>) -> bool,
{
    for line in raw.lines() {
        let line = line.trim();
        // ASCII lowering keeps byte offsets valid for slicing `line`.
        let lower = line.to_ascii_lowercase();

        for label in EXPIRY_LABELS {
            let Some(pos) = lower.find(label) else {
                continue;
            };
            let Some(value) = line.get(pos + label.len()..) else {
                continue;
            };
            let value = value.trim_start_matches(|c: char| c == ':' || c.is_whitespace()).trim();
            if value.is_empty() {
                continue;
            }

            if let Some(instant) = parse_value(value) {
                if accept(instant) {
                    return Some(instant);
                }
            }
        }
    }

    None
}

/// First non-empty registrar value on a labelled line.
pub fn scan_registrar(raw: &str) -> Option<String> {
    for line in raw.lines() {
        let line = line.trim();
        let lower = line.to_ascii_lowercase();
        for label in REGISTRAR_LABELS {
            if let Some(value) = lower
                .find(label)
                .and_then(|pos| line.get(pos + label.len()..))
                .map(str::trim)
                .filter(|v| !v.is_empty())
            {
                return Some(value.to_string());
            }
        }
    }
    None
}

/// Raw value first, then the cleaned value, then bare numeric dates.
pub fn parse_value(value: &str) -> Option<DateTime<Utc>> {
    if let Some(instant) = parse_timestamp(value) {
        return Some(instant);
    }
    let cleaned = clean_value(value);
    parse_timestamp(&cleaned).or_else(|| numeric_date(&cleaned))
}

/// Strip parentheticals, zone names and trailing offsets.
pub fn clean_value(value: &str) -> String {
    let cleaned = PARENTHETICAL.replace_all(value, "");
    let cleaned = ZONE_WORD.replace_all(&cleaned, "");
    let cleaned = EMBEDDED_ZONE.replace(&cleaned, "$1");
    let cleaned = TRAILING_OFFSET.replace(cleaned.trim(), "");
    let cleaned = cleaned.trim();
    cleaned
        .strip_suffix('Z')
        .filter(|rest| rest.ends_with(|c: char| c.is_ascii_digit()))
        .unwrap_or(cleaned)
        .trim()
        .to_string()
}

/// Pull a bare numeric date out of free text.
pub fn numeric_date(text: &str) -> Option<DateTime<Utc>> {
    for (pattern, order) in NUMERIC_PATTERNS.iter() {
        let Some(caps) = pattern.captures(text) else {
            continue;
        };
        let fields: Vec<u32> = (1..=3)
            .filter_map(|i| caps.get(i).and_then(|m| m.as_str().parse().ok()))
            .collect();
        let &[a, b, c] = fields.as_slice() else {
            continue;
        };
        let (year, month, day) = match order {
            FieldOrder::Ymd => (a, b, c),
            FieldOrder::Mdy => (c, a, b),
            FieldOrder::Dmy => (c, b, a),
        };
        if !(2000..=2100).contains(&year) {
            continue;
        }
        if let Some(date) = NaiveDate::from_ymd_opt(year as i32, month, day) {
            return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn midnight(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_clean_value() {
        assert_eq!(clean_value("2030-08-13 04:00:00 (UTC)"), "2030-08-13 04:00:00");
        assert_eq!(clean_value("2030-08-13 04:00:00 UTC"), "2030-08-13 04:00:00");
        assert_eq!(clean_value("2030-08-13 04:00:00 +0800"), "2030-08-13 04:00:00");
        assert_eq!(clean_value("2030-08-13T04:00:00Z"), "2030-08-13T04:00:00");
        assert_eq!(
            clean_value("Tue Aug 13 04:00:00 CEST 2030"),
            "Tue Aug 13 04:00:00 2030"
        );
    }

    #[test]
    fn test_scan_expiry_with_noise() {
        let raw = "Some banner\nDomain expires: 2030-08-13 (renewal pending)\n";
        assert_eq!(scan_expiry(raw, |_| true), Some(midnight(2030, 8, 13)));
    }

    #[test]
    fn test_scan_expiry_respects_accept() {
        let raw = "Expires: 1999-01-01\nExpiration Date: 2030-08-13\n";
        let found = scan_expiry(raw, |dt| dt > midnight(2020, 1, 1));
        assert_eq!(found, Some(midnight(2030, 8, 13)));
    }

    #[test]
    fn test_numeric_date_orders() {
        assert_eq!(numeric_date("on 2030-8-3 maybe"), Some(midnight(2030, 8, 3)));
        assert_eq!(numeric_date("08/13/2030"), Some(midnight(2030, 8, 13)));
        assert_eq!(numeric_date("2030.08.13"), Some(midnight(2030, 8, 13)));
        assert_eq!(numeric_date("13.08.2030"), Some(midnight(2030, 8, 13)));
        assert_eq!(numeric_date("1899-01-01"), None);
        assert_eq!(numeric_date("2030-02-30"), None);
    }

    #[test]
    fn test_scan_registrar() {
        let raw = "Domain: a.com\nSponsoring Registrar: Example Registrar, Inc.\n";
        assert_eq!(
            scan_registrar(raw),
            Some("Example Registrar, Inc.".to_string())
        );
        assert_eq!(scan_registrar("nothing here"), None);
    }
}
