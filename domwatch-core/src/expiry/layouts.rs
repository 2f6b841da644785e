//! Timestamp layouts seen in registry and registrar WHOIS output.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// One way a registry writes a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Rfc3339,
    Rfc2822,
    /// chrono format carrying an explicit UTC offset.
    Offset(&'static str),
    /// Date and time without a zone, read as UTC.
    DateTime(&'static str),
    /// Calendar date only, read as midnight UTC.
    Date(&'static str),
}

/// Tried in order. Zoned and timed layouts come before the bare dates so a
/// value is never truncated to midnight when it carries a time.
pub const LAYOUTS: &[Layout] = &[
    Layout::Rfc3339,
    Layout::Offset("%Y-%m-%dT%H:%M:%S%.f%z"),
    Layout::Offset("%Y-%m-%d %H:%M:%S%.f%:z"),
    Layout::Offset("%Y-%m-%d %H:%M:%S%.f %z"),
    Layout::DateTime("%Y-%m-%dT%H:%M:%S%.f"),
    Layout::DateTime("%Y-%m-%d %H:%M:%S%.f"),
    Layout::Date("%Y-%m-%d"),
    Layout::DateTime("%d-%b-%Y %H:%M:%S"),
    Layout::Date("%d-%b-%Y"),
    Layout::Date("%d-%B-%Y"),
    Layout::DateTime("%Y/%m/%d %H:%M:%S"),
    Layout::Date("%Y/%m/%d"),
    Layout::Date("%m/%d/%Y"),
    Layout::DateTime("%Y.%m.%d %H:%M:%S"),
    Layout::Date("%Y.%m.%d"),
    Layout::DateTime("%d.%m.%Y %H:%M:%S"),
    Layout::Date("%d.%m.%Y"),
    Layout::Rfc2822,
    Layout::DateTime("%a %b %e %H:%M:%S %Y"),
    Layout::Date("%B %d, %Y"),
    Layout::Date("%b %d %Y"),
    Layout::Date("%d %B %Y"),
    Layout::Date("%d %b %Y"),
];

impl Layout {
    pub fn parse(&self, value: &str) -> Option<DateTime<Utc>> {
        match self {
            Layout::Rfc3339 => DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            Layout::Rfc2822 => DateTime::parse_from_rfc2822(value)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            Layout::Offset(fmt) => DateTime::parse_from_str(value, fmt)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            Layout::DateTime(fmt) => NaiveDateTime::parse_from_str(value, fmt)
                .ok()
                .map(|dt| dt.and_utc()),
            Layout::Date(fmt) => NaiveDate::parse_from_str(value, fmt)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc()),
        }
    }

    /// Render `instant` in this layout.
    pub fn format(&self, instant: DateTime<Utc>) -> String {
        match self {
            Layout::Rfc3339 => instant.to_rfc3339(),
            Layout::Rfc2822 => instant.to_rfc2822(),
            Layout::Offset(fmt) | Layout::DateTime(fmt) | Layout::Date(fmt) => {
                instant.format(fmt).to_string()
            }
        }
    }

    pub fn is_date_only(&self) -> bool {
        matches!(self, Layout::Date(_))
    }
}

/// First layout that accepts the whole trimmed value.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    LAYOUTS.iter().find_map(|layout| layout.parse(value))
}
