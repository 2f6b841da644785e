use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Result, WatchError};

/// `Key: value` with a short, label-like key. The key stops at the first
/// colon so timestamps in the value survive intact.
static FIELD_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([A-Za-z][A-Za-z0-9 /_.()\-]{0,63}?)\s*:\s*(.*)$")
        .expect("Invalid WHOIS field regex")
});

/// JPRS style `[Key]   value`.
static BRACKET_FIELD_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*\[([^\]]{1,64})\]\s+(.+)$").expect("Invalid WHOIS bracket field regex")
});

const EXPIRATION_KEYS: &[&str] = &[
    "registry expiry date",
    "registrar registration expiration date",
    "registration expiration date",
    "domain expiration date",
    "expiration date",
    "expiry date",
    "expiration time",
    "expire date",
    "expires on",
    "expires",
    "expire",
    "paid-till",
    "valid until",
    "renewal date",
    "record expires on",
    "domain expires",
    "expiration",
];

const REGISTRAR_KEYS: &[&str] = &["registrar", "sponsoring registrar", "registrar name"];

const NOT_FOUND_PATTERNS: &[&str] = &[
    "no match",
    "not found",
    "no data found",
    "no entries found",
    "status: free",
    "status: available",
    "domain not found",
    "no object found",
];

/// Field-aware view of a WHOIS response.
///
/// Keys are lower-cased and whitespace-collapsed; values are kept verbatim
/// (trimmed). Repeated keys are kept in order of appearance.
#[derive(Debug, Clone, Default)]
pub struct WhoisRecord {
    fields: Vec<(String, String)>,
}

impl WhoisRecord {
    /// Parse raw WHOIS text into fields.
    ///
    /// Fails when the text is blank, carries no recognizable fields, or is a
    /// registry's "no such domain" answer.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Err(WatchError::UnparseableResponse("empty response".to_string()));
        }

        let mut fields = Vec::new();
        // Key whose value sits on the following indented line (Nominet style).
        let mut pending_key: Option<String> = None;

        for line in raw.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                pending_key = None;
                continue;
            }
            if trimmed.starts_with('%') || trimmed.starts_with('#') || trimmed.starts_with(">>>") {
                continue;
            }

            if let Some(key) = pending_key.take() {
                if line.starts_with(char::is_whitespace) && !has_inline_value(line) {
                    push_field(&mut fields, &key, trimmed);
                    continue;
                }
            }

            if let Some(caps) = BRACKET_FIELD_PATTERN.captures(line) {
                push_field(&mut fields, &caps[1], &caps[2]);
                continue;
            }

            if let Some(caps) = FIELD_PATTERN.captures(line) {
                let key = &caps[1];
                let value = caps[2].trim();
                if key.to_lowercase().contains("http") {
                    continue;
                }
                if value.is_empty() {
                    pending_key = Some(key.to_string());
                } else {
                    push_field(&mut fields, key, value);
                }
            }
        }

        let record = WhoisRecord { fields };

        if record.expiration().is_none() {
            let lower = raw.to_lowercase();
            if NOT_FOUND_PATTERNS.iter().any(|p| lower.contains(p)) {
                return Err(WatchError::DomainNotFound(
                    raw.lines().find(|l| !l.trim().is_empty()).unwrap_or("").trim().to_string(),
                ));
            }
        }

        if record.fields.is_empty() {
            return Err(WatchError::UnparseableResponse(
                "no key/value fields".to_string(),
            ));
        }

        Ok(record)
    }

    /// First value among `keys`, honoring the order of `keys`.
    pub fn first(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|key| {
            self.fields
                .iter()
                .find(|(k, v)| k == key && !v.is_empty())
                .map(|(_, v)| v.as_str())
        })
    }

    pub fn all(&self, key: &str) -> impl Iterator<Item = &str> {
        let key = key.to_string();
        self.fields
            .iter()
            .filter(move |(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn expiration(&self) -> Option<&str> {
        self.first(EXPIRATION_KEYS)
    }

    pub fn registrar(&self) -> Option<&str> {
        self.first(REGISTRAR_KEYS)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn has_inline_value(line: &str) -> bool {
    FIELD_PATTERN
        .captures(line)
        .map(|caps| !caps[2].trim().is_empty())
        .unwrap_or(false)
}

fn push_field(fields: &mut Vec<(String, String)>, key: &str, value: &str) {
    let value = value.trim();
    if value.eq_ignore_ascii_case("redacted") || value.to_lowercase().starts_with("redacted for") {
        return;
    }
    let key = key
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    fields.push((key, value.to_string()));
}
