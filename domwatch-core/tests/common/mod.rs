#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use domwatch_core::{
    CheckOrchestrator, CheckTrigger, ConfigCoordinator, ConfigLayers, DomainRecord, DomainResolver,
    DomainStore, LiveConfig, ResolutionMethod, Result, WatchError, WhoisTransport,
};

pub const EXAMPLE_COM: &str = "   Domain Name: EXAMPLE.COM\n   Registry Domain ID: 2336799_DOMAIN_COM-VRSN\n   Registrar: RESERVED-Internet Assigned Numbers Authority\n   Updated Date: 2024-08-14T07:01:34Z\n   Creation Date: 1995-08-14T04:00:00Z\n   Registry Expiry Date: 2030-08-13T04:00:00Z\n   Domain Status: clientDeleteProhibited\n>>> Last update of whois database: 2026-10-19T00:00:00Z <<<\n";

/// Canned WHOIS answers keyed by server; unknown servers answer with nothing.
#[derive(Default)]
pub struct FakeTransport {
    replies: HashMap<String, String>,
    calls: Mutex<Vec<String>>,
}

impl FakeTransport {
    pub fn with(mut self, server: &str, reply: &str) -> Self {
        self.replies.insert(server.to_string(), reply.to_string());
        self
    }

    pub fn calls_to(&self, server: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.as_str() == server)
            .count()
    }
}

#[async_trait]
impl WhoisTransport for FakeTransport {
    async fn query(&self, server: &str, _query: &str, _budget: Duration) -> Result<String> {
        self.calls.lock().unwrap().push(server.to_string());
        self.replies
            .get(server)
            .cloned()
            .ok_or_else(|| WatchError::EmptyResponse(server.to_string()))
    }
}

/// Succeeds after `delay`, tracking how many resolutions overlap.
pub struct SlowResolver {
    delay: Duration,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub calls: AtomicUsize,
}

impl SlowResolver {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl DomainResolver for SlowResolver {
    async fn resolve(&self, domain: &str, _config: &LiveConfig) -> DomainRecord {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let now = Utc::now();
        DomainRecord::resolved(
            domain,
            now + ChronoDuration::days(200),
            None,
            ResolutionMethod::Standard,
            now,
        )
    }
}

pub struct Harness {
    pub store: Arc<DomainStore>,
    pub trigger: CheckTrigger,
    pub coordinator: Arc<ConfigCoordinator>,
    pub orchestrator: Arc<CheckOrchestrator>,
}

pub fn harness(config: LiveConfig, resolver: Arc<dyn DomainResolver>) -> Harness {
    let store = Arc::new(DomainStore::new());
    let trigger = CheckTrigger::new();
    let coordinator = Arc::new(
        ConfigCoordinator::with_initial(ConfigLayers::default(), config)
            .with_store(store.clone())
            .with_trigger(trigger.clone()),
    );
    let orchestrator = Arc::new(CheckOrchestrator::new(
        coordinator.clone(),
        resolver,
        store.clone(),
        trigger.clone(),
    ));
    Harness {
        store,
        trigger,
        coordinator,
        orchestrator,
    }
}

pub fn config_for(domains: &[&str]) -> LiveConfig {
    LiveConfig {
        domains: domains.iter().map(|d| d.to_string()).collect(),
        ..LiveConfig::default()
    }
}

/// Poll `condition` until it holds, failing the test after two seconds.
pub async fn eventually<F>(condition: F)
where
    F: Fn() -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
