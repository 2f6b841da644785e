//! Latest [`DomainRecord`] per configured domain, plus its metric series.

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::{debug, warn};

use crate::metrics::DomainMetrics;
use crate::record::DomainRecord;

#[derive(Debug, Default)]
pub struct DomainStore {
    records: RwLock<HashMap<String, DomainRecord>>,
    metrics: DomainMetrics,
}

impl DomainStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the domain's record wholesale and refresh its series.
    pub fn publish(&self, record: DomainRecord) {
        self.publish_if(record, |_| true);
    }

    /// Like [`publish`](Self::publish), but only when `keep` accepts the
    /// domain name. `keep` runs under the record lock, so a concurrent
    /// [`retain_domains`](Self::retain_domains) either sees the inserted
    /// record or the record is never inserted.
    pub fn publish_if<F>(&self, record: DomainRecord, keep: F) -> bool
    where
        F: FnOnce(&str) -> bool,
    {
        let mut records = match self.records.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Record store write lock poisoned, recovering");
                poisoned.into_inner()
            }
        };
        if !keep(&record.name) {
            return false;
        }
        self.metrics.record(&record);
        records.insert(record.name.clone(), record);
        true
    }

    pub fn get(&self, name: &str) -> Option<DomainRecord> {
        let records = match self.records.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Record store read lock poisoned, recovering");
                poisoned.into_inner()
            }
        };
        records.get(name).cloned()
    }

    /// Every record, sorted by name.
    pub fn snapshot(&self) -> Vec<DomainRecord> {
        let records = match self.records.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Record store read lock poisoned, recovering");
                poisoned.into_inner()
            }
        };
        let mut all: Vec<DomainRecord> = records.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Drop records and series for domains not in `domains`. Returns the
    /// names that were removed.
    pub fn retain_domains(&self, domains: &[String]) -> Vec<String> {
        let mut records = match self.records.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Record store write lock poisoned, recovering");
                poisoned.into_inner()
            }
        };
        let removed: Vec<String> = records
            .keys()
            .filter(|name| !domains.contains(name))
            .cloned()
            .collect();
        for name in &removed {
            records.remove(name);
        }

        // Still under the record lock: series and records are written together.
        for name in self.metrics.domains() {
            if !domains.contains(&name) {
                self.metrics.retract(&name);
            }
        }
        drop(records);

        if !removed.is_empty() {
            debug!(removed = ?removed, "Removed records for unconfigured domains");
        }
        removed
    }

    pub fn metrics(&self) -> &DomainMetrics {
        &self.metrics
    }

    pub fn len(&self) -> usize {
        match self.records.read() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::EXPIRY_DAYS;
    use chrono::Utc;

    #[test]
    fn test_publish_overwrites_wholesale() {
        let store = DomainStore::new();
        store.publish(DomainRecord::failed("a.com", "first", Utc::now()));
        store.publish(DomainRecord::failed("a.com", "second", Utc::now()));

        assert_eq!(store.len(), 1);
        assert_eq!(
            store.get("a.com").unwrap().last_error.as_deref(),
            Some("second")
        );
    }

    #[test]
    fn test_retain_domains_retracts_series() {
        let store = DomainStore::new();
        store.publish(DomainRecord::failed("a.com", "x", Utc::now()));
        store.publish(DomainRecord::failed("b.com", "x", Utc::now()));

        let removed = store.retain_domains(&["b.com".to_string()]);
        assert_eq!(removed, vec!["a.com"]);
        assert!(store.get("a.com").is_none());
        assert!(store.metrics().value(EXPIRY_DAYS, "a.com").is_none());
        assert!(store.metrics().value(EXPIRY_DAYS, "b.com").is_some());
    }

    #[test]
    fn test_snapshot_is_sorted() {
        let store = DomainStore::new();
        store.publish(DomainRecord::failed("z.com", "x", Utc::now()));
        store.publish(DomainRecord::failed("a.com", "x", Utc::now()));
        let names: Vec<_> = store.snapshot().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["a.com", "z.com"]);
    }

    #[test]
    fn test_publish_if_rejected_leaves_no_series() {
        let store = DomainStore::new();
        let kept = store.publish_if(DomainRecord::failed("a.com", "x", Utc::now()), |name| {
            name == "b.com"
        });

        assert!(!kept);
        assert!(store.is_empty());
        assert!(store.metrics().domains().is_empty());
    }
}
