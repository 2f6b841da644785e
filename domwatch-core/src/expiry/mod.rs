//! Expiry date extraction from raw WHOIS text.
//!
//! Two passes: the field-aware [`WhoisRecord`] parser first, then a label
//! scan over every line. Either way a candidate is only accepted inside the
//! sanity window around "now", which keeps registry creation dates and
//! far-future placeholders out.

pub mod layouts;
pub mod manual;

use chrono::{DateTime, Months, Utc};
use tracing::debug;

use crate::error::{Result, WatchError};
use crate::whois::WhoisRecord;

pub use layouts::{parse_timestamp, Layout, LAYOUTS};

/// Which pass produced the date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionSource {
    Structured,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub expiry: DateTime<Utc>,
    pub registrar: Option<String>,
    pub source: ExtractionSource,
}

/// Accepted range for an expiry date, relative to the time of the check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SanityWindow {
    pub months_back: u32,
    pub months_ahead: u32,
}

impl Default for SanityWindow {
    fn default() -> Self {
        Self {
            months_back: 12,
            months_ahead: 240,
        }
    }
}

impl SanityWindow {
    pub fn bounds(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let earliest = now
            .checked_sub_months(Months::new(self.months_back))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let latest = now
            .checked_add_months(Months::new(self.months_ahead))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        (earliest, latest)
    }

    pub fn contains(&self, candidate: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let (earliest, latest) = self.bounds(now);
        candidate >= earliest && candidate <= latest
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExpiryExtractor {
    window: SanityWindow,
}

impl ExpiryExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_window(mut self, window: SanityWindow) -> Self {
        self.window = window;
        self
    }

    pub fn extract(&self, raw: &str) -> Result<Extraction> {
        self.extract_at(raw, Utc::now())
    }

    /// Extract relative to a fixed `now`.
    pub fn extract_at(&self, raw: &str, now: DateTime<Utc>) -> Result<Extraction> {
        let accept = |candidate: DateTime<Utc>| self.window.contains(candidate, now);

        let structured = WhoisRecord::parse(raw);
        let mut registrar = None;

        match &structured {
            Ok(record) => {
                registrar = record.registrar().map(str::to_string);
                if let Some(value) = record.expiration() {
                    match parse_timestamp(value) {
                        Some(expiry) if accept(expiry) => {
                            return Ok(Extraction {
                                expiry,
                                registrar,
                                source: ExtractionSource::Structured,
                            });
                        }
                        Some(expiry) => {
                            debug!(%expiry, "Structured expiry outside sanity window")
                        }
                        None => debug!(value, "Structured expiry in unknown layout"),
                    }
                }
            }
            Err(e) => debug!(error = %e, "Structured parse failed, scanning lines"),
        }

        if let Some(expiry) = manual::scan_expiry(raw, accept) {
            return Ok(Extraction {
                expiry,
                registrar: registrar.or_else(|| manual::scan_registrar(raw)),
                source: ExtractionSource::Manual,
            });
        }

        match structured {
            Err(e @ WatchError::DomainNotFound(_)) => Err(e),
            _ => Err(WatchError::ExpiryNotFound),
        }
    }
}
