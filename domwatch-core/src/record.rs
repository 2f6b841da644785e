use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

/// `days_remaining` for a domain whose check failed.
pub const FAILURE_SENTINEL_DAYS: i64 = -999;

/// How an expiry date was obtained.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResolutionMethod {
    /// Registry (and referral) chain, structured parse.
    Standard,
    /// Direct query to a backup server.
    Backup(String),
    /// Registry chain, found by scanning lines.
    ManualParse,
    /// Synthesized for a special-cased domain.
    Estimated,
}

impl fmt::Display for ResolutionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionMethod::Standard => write!(f, "whois-standard"),
            ResolutionMethod::Backup(server) => write!(f, "whois-backup:{}", server),
            ResolutionMethod::ManualParse => write!(f, "whois-manual-parse"),
            ResolutionMethod::Estimated => write!(f, "estimated"),
        }
    }
}

impl Serialize for ResolutionMethod {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Latest known state of one monitored domain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainRecord {
    pub name: String,
    pub expiry_time: Option<DateTime<Utc>>,
    pub days_remaining: i64,
    pub registrar: Option<String>,
    pub valid: bool,
    pub last_error: Option<String>,
    pub last_checked_at: DateTime<Utc>,
    pub resolution_method: Option<ResolutionMethod>,
}

impl DomainRecord {
    pub fn resolved(
        name: impl Into<String>,
        expiry: DateTime<Utc>,
        registrar: Option<String>,
        method: ResolutionMethod,
        checked_at: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            expiry_time: Some(expiry),
            days_remaining: days_until(expiry, checked_at),
            registrar,
            valid: true,
            last_error: None,
            last_checked_at: checked_at,
            resolution_method: Some(method),
        }
    }

    pub fn failed(name: impl Into<String>, error: impl fmt::Display, checked_at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            expiry_time: None,
            days_remaining: FAILURE_SENTINEL_DAYS,
            registrar: None,
            valid: false,
            last_error: Some(error.to_string()),
            last_checked_at: checked_at,
            resolution_method: None,
        }
    }
}

/// Whole days from `now` until `expiry`, truncated toward zero.
pub fn days_until(expiry: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (expiry - now).num_days()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_days_until_truncates() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        let expiry = Utc.with_ymd_and_hms(2026, 10, 29, 11, 0, 0).unwrap();
        assert_eq!(days_until(expiry, now), 9);
        assert_eq!(days_until(now, now), 0);
        let past = Utc.with_ymd_and_hms(2026, 10, 17, 11, 0, 0).unwrap();
        assert_eq!(days_until(past, now), -2);
    }

    #[test]
    fn test_failed_record_uses_sentinel() {
        let now = Utc::now();
        let record = DomainRecord::failed("badtld.xx", "no server", now);
        assert!(!record.valid);
        assert_eq!(record.days_remaining, FAILURE_SENTINEL_DAYS);
        assert_eq!(record.last_error.as_deref(), Some("no server"));
        assert!(record.resolution_method.is_none());
    }

    #[test]
    fn test_method_tags() {
        assert_eq!(ResolutionMethod::Standard.to_string(), "whois-standard");
        assert_eq!(
            ResolutionMethod::Backup("whois.nic.uk".into()).to_string(),
            "whois-backup:whois.nic.uk"
        );
        assert_eq!(ResolutionMethod::ManualParse.to_string(), "whois-manual-parse");
        assert_eq!(ResolutionMethod::Estimated.to_string(), "estimated");

        let json = serde_json::to_value(ResolutionMethod::Estimated).unwrap();
        assert_eq!(json, serde_json::json!("estimated"));
    }
}
