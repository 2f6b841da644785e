//! Scheduled and on-demand check passes over every configured domain.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::config::{ConfigCoordinator, ExecutionMode, LiveConfig};
use crate::record::DomainRecord;
use crate::resolver::DomainResolver;
use crate::store::DomainStore;
use crate::trigger::CheckTrigger;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassReason {
    Startup,
    Schedule,
    Trigger,
}

impl fmt::Display for PassReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassReason::Startup => write!(f, "startup"),
            PassReason::Schedule => write!(f, "schedule"),
            PassReason::Trigger => write!(f, "trigger"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub checked: usize,
    pub valid: usize,
    pub invalid: usize,
    /// Results dropped because the domain left the configuration mid-pass.
    pub discarded: usize,
    pub elapsed: Duration,
}

pub struct CheckOrchestrator {
    coordinator: Arc<ConfigCoordinator>,
    resolver: Arc<dyn DomainResolver>,
    store: Arc<DomainStore>,
    trigger: CheckTrigger,
    passes: AtomicU64,
}

impl CheckOrchestrator {
    pub fn new(
        coordinator: Arc<ConfigCoordinator>,
        resolver: Arc<dyn DomainResolver>,
        store: Arc<DomainStore>,
        trigger: CheckTrigger,
    ) -> Self {
        Self {
            coordinator,
            resolver,
            store,
            trigger,
            passes: AtomicU64::new(0),
        }
    }

    pub fn trigger(&self) -> &CheckTrigger {
        &self.trigger
    }

    pub fn store(&self) -> &Arc<DomainStore> {
        &self.store
    }

    pub fn passes_completed(&self) -> u64 {
        self.passes.load(Ordering::SeqCst)
    }

    /// Cold-start pass, then passes on schedule or trigger until `shutdown`
    /// flips to `true` (or its sender goes away).
    ///
    /// An in-flight pass always runs to completion.
    pub async fn run_forever(&self, mut shutdown: watch::Receiver<bool>) {
        info!("Starting domain expiry checks");
        self.run_pass(PassReason::Startup).await;
        self.trigger.mark_startup_complete();

        let mut next_tick = Instant::now() + self.coordinator.current().check_interval;

        loop {
            let stopping = *shutdown.borrow();
            if stopping {
                break;
            }

            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    info!("Stop requested");
                    break;
                }
                _ = self.trigger.wait() => {
                    info!("Check triggered");
                    self.run_pass(PassReason::Trigger).await;
                }
                _ = tokio::time::sleep_until(next_tick) => {
                    self.run_pass(PassReason::Schedule).await;
                }
            }

            // Re-read so interval changes apply from the next fire.
            next_tick = Instant::now() + self.coordinator.current().check_interval;
            debug!(
                interval_secs = self.coordinator.current().check_interval.as_secs(),
                "Next scheduled check"
            );
        }

        info!(passes = self.passes_completed(), "Domain expiry checks stopped");
    }

    /// One pass over the domains of the current configuration.
    pub async fn run_pass(&self, reason: PassReason) -> PassSummary {
        let config = self.coordinator.current();
        let started = Instant::now();
        info!(
            reason = %reason,
            domains = config.domains.len(),
            execution = %config.execution,
            "Starting check pass"
        );

        let mut summary = match config.execution {
            ExecutionMode::Concurrent { limit } => self.run_concurrent(&config, limit).await,
            ExecutionMode::Serial { pause } => self.run_serial(&config, pause).await,
        };
        summary.elapsed = started.elapsed();

        let pass = self.passes.fetch_add(1, Ordering::SeqCst) + 1;
        info!(
            pass,
            reason = %reason,
            checked = summary.checked,
            valid = summary.valid,
            invalid = summary.invalid,
            discarded = summary.discarded,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Check pass complete"
        );
        summary
    }

    async fn run_concurrent(&self, config: &Arc<LiveConfig>, limit: usize) -> PassSummary {
        let semaphore = Arc::new(Semaphore::new(limit.max(1)));
        let mut tasks = JoinSet::new();

        for domain in config.domains.iter().cloned() {
            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let resolver = Arc::clone(&self.resolver);
            let coordinator = Arc::clone(&self.coordinator);
            let store = Arc::clone(&self.store);
            let config = Arc::clone(config);

            tasks.spawn(async move {
                let record = resolver.resolve(&domain, &config).await;
                drop(permit);
                publish(&coordinator, &store, record)
            });
        }

        let mut summary = PassSummary::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => summary.count(outcome),
                Err(e) => error!(error = %e, "Domain check task failed"),
            }
        }
        summary
    }

    async fn run_serial(&self, config: &Arc<LiveConfig>, pause: Duration) -> PassSummary {
        let mut summary = PassSummary::default();
        let total = config.domains.len();

        for (index, domain) in config.domains.iter().enumerate() {
            let record = self.resolver.resolve(domain, config).await;
            summary.count(publish(&self.coordinator, &self.store, record));

            if index + 1 < total && !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }
        }
        summary
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Published {
    Valid,
    Invalid,
    Discarded,
}

impl PassSummary {
    fn count(&mut self, outcome: Published) {
        match outcome {
            Published::Valid => {
                self.checked += 1;
                self.valid += 1;
            }
            Published::Invalid => {
                self.checked += 1;
                self.invalid += 1;
            }
            Published::Discarded => self.discarded += 1,
        }
    }
}

/// Store the record unless its domain left the configuration meanwhile.
///
/// Membership is checked under the store's record lock so a concurrent
/// retraction cannot be undone by a late result.
fn publish(coordinator: &ConfigCoordinator, store: &DomainStore, record: DomainRecord) -> Published {
    let name = record.name.clone();
    let valid = record.valid;
    if !store.publish_if(record, |domain| coordinator.current().contains_domain(domain)) {
        debug!(domain = %name, "Discarding result for domain no longer configured");
        return Published::Discarded;
    }
    if valid {
        Published::Valid
    } else {
        Published::Invalid
    }
}
