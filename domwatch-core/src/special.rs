//! Domains whose expiry is estimated when WHOIS will not answer.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Months, Utc};

pub trait ExpiryEstimator: Send + Sync {
    fn estimate(&self, domain: &str, now: DateTime<Utc>) -> DateTime<Utc>;
}

/// A fixed number of months from now.
#[derive(Debug, Clone, Copy)]
pub struct FixedHorizon {
    months: u32,
}

impl FixedHorizon {
    pub fn months(months: u32) -> Self {
        Self { months }
    }

    pub fn one_year() -> Self {
        Self::months(12)
    }
}

impl ExpiryEstimator for FixedHorizon {
    fn estimate(&self, _domain: &str, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_add_months(Months::new(self.months))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// Domain name to estimator.
#[derive(Clone)]
pub struct SpecialDomains {
    handlers: HashMap<String, Arc<dyn ExpiryEstimator>>,
}

impl Default for SpecialDomains {
    fn default() -> Self {
        Self::empty()
            .with("github.com", FixedHorizon::one_year())
            .with("stackoverflow.com", FixedHorizon::one_year())
    }
}

impl SpecialDomains {
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn with(mut self, domain: &str, estimator: impl ExpiryEstimator + 'static) -> Self {
        self.handlers
            .insert(domain.to_lowercase(), Arc::new(estimator));
        self
    }

    pub fn get(&self, domain: &str) -> Option<&dyn ExpiryEstimator> {
        self.handlers.get(domain).map(|e| e.as_ref())
    }

    pub fn contains(&self, domain: &str) -> bool {
        self.handlers.contains_key(domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_default_table() {
        let table = SpecialDomains::default();
        assert!(table.contains("github.com"));
        assert!(table.contains("stackoverflow.com"));
        assert!(!table.contains("example.com"));
    }

    #[test]
    fn test_fixed_horizon() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 0, 0, 0).unwrap();
        let estimate = FixedHorizon::one_year().estimate("github.com", now);
        assert_eq!(estimate, Utc.with_ymd_and_hms(2027, 10, 19, 0, 0, 0).unwrap());
    }
}
