use std::time::Duration;

use tracing::info;

use super::{ExecutionMode, LiveConfig};

/// Fields that differ between two configurations, as `(old, new)` pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigDelta {
    pub domains: Option<(Vec<String>, Vec<String>)>,
    pub check_interval: Option<(Duration, Duration)>,
    pub timeout: Option<(Duration, Duration)>,
    pub execution: Option<(ExecutionMode, ExecutionMode)>,
    pub backup_whois_servers: Option<(Vec<String>, Vec<String>)>,
    pub retry_attempts: Option<(usize, usize)>,
    pub log_level: Option<(String, String)>,
}

fn changed<T: PartialEq + Clone>(old: &T, new: &T) -> Option<(T, T)> {
    (old != new).then(|| (old.clone(), new.clone()))
}

impl ConfigDelta {
    pub fn between(old: &LiveConfig, new: &LiveConfig) -> Self {
        Self {
            domains: changed(&old.domains, &new.domains),
            check_interval: changed(&old.check_interval, &new.check_interval),
            timeout: changed(&old.timeout, &new.timeout),
            execution: changed(&old.execution, &new.execution),
            backup_whois_servers: changed(&old.backup_whois_servers, &new.backup_whois_servers),
            retry_attempts: changed(&old.retry_attempts, &new.retry_attempts),
            log_level: changed(&old.log_level, &new.log_level),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == ConfigDelta::default()
    }

    pub fn domains_changed(&self) -> bool {
        self.domains.is_some()
    }

    /// Domains present before and absent now.
    pub fn removed_domains(&self) -> Vec<String> {
        match &self.domains {
            Some((old, new)) => old.iter().filter(|d| !new.contains(d)).cloned().collect(),
            None => Vec::new(),
        }
    }

    pub fn added_domains(&self) -> Vec<String> {
        match &self.domains {
            Some((old, new)) => new.iter().filter(|d| !old.contains(d)).cloned().collect(),
            None => Vec::new(),
        }
    }

    /// One `info!` line per changed field.
    pub fn log(&self) {
        if let Some((old, new)) = &self.domains {
            info!(
                old = ?old,
                new = ?new,
                added = ?self.added_domains(),
                removed = ?self.removed_domains(),
                "Domain list changed"
            );
        }
        if let Some((old, new)) = &self.check_interval {
            info!(old_secs = old.as_secs(), new_secs = new.as_secs(), "Check interval changed");
        }
        if let Some((old, new)) = &self.timeout {
            info!(old_secs = old.as_secs(), new_secs = new.as_secs(), "Timeout changed");
        }
        if let Some((old, new)) = &self.execution {
            info!(old = %old, new = %new, "Execution mode changed");
        }
        if let Some((old, new)) = &self.backup_whois_servers {
            info!(old = ?old, new = ?new, "Backup WHOIS servers changed");
        }
        if let Some((old, new)) = &self.retry_attempts {
            info!(old, new, "Retry attempts changed");
        }
        if let Some((old, new)) = &self.log_level {
            info!(old = %old, new = %new, "Log level changed, takes effect on restart");
        }
    }
}
