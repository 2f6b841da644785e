//! Per-domain metric series.
//!
//! Only the values are kept here; exposing them (Prometheus text, JSON) is
//! left to whoever calls [`DomainMetrics::gather`].

use std::collections::BTreeMap;
use std::sync::RwLock;

use tracing::{debug, warn};

use crate::record::{DomainRecord, FAILURE_SENTINEL_DAYS};

pub const EXPIRY_DAYS: &str = "domain_expiry_days";
pub const CHECK_STATUS: &str = "domain_check_status";
pub const CHECK_TIMESTAMP: &str = "domain_check_timestamp";
pub const EXPIRY_TIMESTAMP: &str = "domain_expiry_timestamp";

#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub name: &'static str,
    pub domain: String,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct DomainSeries {
    expiry_days: f64,
    check_status: f64,
    check_timestamp: f64,
    expiry_timestamp: f64,
}

impl From<&DomainRecord> for DomainSeries {
    fn from(record: &DomainRecord) -> Self {
        let (expiry_days, expiry_timestamp) = match (record.valid, record.expiry_time) {
            (true, Some(expiry)) => (record.days_remaining as f64, expiry.timestamp() as f64),
            _ => (FAILURE_SENTINEL_DAYS as f64, 0.0),
        };
        Self {
            expiry_days,
            check_status: if record.valid { 1.0 } else { 0.0 },
            check_timestamp: record.last_checked_at.timestamp() as f64,
            expiry_timestamp,
        }
    }
}

/// The four gauges, keyed by domain.
#[derive(Debug, Default)]
pub struct DomainMetrics {
    series: RwLock<BTreeMap<String, DomainSeries>>,
}

impl DomainMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set every series for the record's domain.
    pub fn record(&self, record: &DomainRecord) {
        let mut series = match self.series.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Metrics write lock poisoned, recovering");
                poisoned.into_inner()
            }
        };
        series.insert(record.name.clone(), DomainSeries::from(record));
    }

    /// Delete every series for `domain`. Returns whether any existed.
    pub fn retract(&self, domain: &str) -> bool {
        let mut series = match self.series.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Metrics write lock poisoned, recovering");
                poisoned.into_inner()
            }
        };
        let removed = series.remove(domain).is_some();
        if removed {
            debug!(domain, "Retracted metric series");
        }
        removed
    }

    /// Current samples, ordered by domain then metric name.
    pub fn gather(&self) -> Vec<MetricSample> {
        let series = match self.series.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Metrics read lock poisoned, recovering");
                poisoned.into_inner()
            }
        };

        series
            .iter()
            .flat_map(|(domain, s)| {
                [
                    (CHECK_STATUS, s.check_status),
                    (CHECK_TIMESTAMP, s.check_timestamp),
                    (EXPIRY_DAYS, s.expiry_days),
                    (EXPIRY_TIMESTAMP, s.expiry_timestamp),
                ]
                .into_iter()
                .map(move |(name, value)| MetricSample {
                    name,
                    domain: domain.clone(),
                    value,
                })
            })
            .collect()
    }

    /// Value of one series, if present.
    pub fn value(&self, name: &str, domain: &str) -> Option<f64> {
        self.gather()
            .into_iter()
            .find(|s| s.name == name && s.domain == domain)
            .map(|s| s.value)
    }

    pub fn domains(&self) -> Vec<String> {
        match self.series.read() {
            Ok(guard) => guard.keys().cloned().collect(),
            Err(poisoned) => {
                warn!("Metrics read lock poisoned, recovering");
                poisoned.into_inner().keys().cloned().collect()
            }
        }
    }
}
