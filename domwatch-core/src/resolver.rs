//! Domain name to [`DomainRecord`], via WHOIS.
//!
//! Each attempt runs the standard lookup chain first, then the backup
//! servers one by one. Transient failures rerun the whole attempt under the
//! retry policy; anything else ends with a failed record.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use crate::config::LiveConfig;
use crate::error::{Result, WatchError};
use crate::expiry::{Extraction, ExtractionSource, ExpiryExtractor};
use crate::record::{DomainRecord, ResolutionMethod};
use crate::retry::{RetryExecutor, RetryPolicy};
use crate::special::SpecialDomains;
use crate::validation::normalize_domain;
use crate::whois::{get_backup_servers, get_tld, WhoisClient, WhoisExchange, WhoisTransport};

/// Resolves one domain. Never fails: problems end up in the record.
#[async_trait]
pub trait DomainResolver: Send + Sync {
    async fn resolve(&self, domain: &str, config: &LiveConfig) -> DomainRecord;
}

/// What one server said during an attempt.
#[derive(Debug, Clone)]
pub struct WhoisProbeResult {
    pub server: String,
    pub raw_len: usize,
    pub elapsed: Duration,
    pub outcome: ProbeOutcome,
}

#[derive(Debug, Clone)]
pub enum ProbeOutcome {
    Parsed {
        expiry: DateTime<Utc>,
        registrar: Option<String>,
    },
    Failed(String),
}

impl WhoisProbeResult {
    fn from_exchange(exchange: &WhoisExchange, result: &Result<Extraction>) -> Self {
        let outcome = match result {
            Ok(extraction) => ProbeOutcome::Parsed {
                expiry: extraction.expiry,
                registrar: extraction.registrar.clone(),
            },
            Err(e) => ProbeOutcome::Failed(e.to_string()),
        };
        let probe = Self {
            server: exchange.server.clone(),
            raw_len: exchange.raw.len(),
            elapsed: exchange.elapsed,
            outcome,
        };
        probe.log();
        probe
    }

    fn transport_failure(server: &str, error: &WatchError) -> Self {
        let probe = Self {
            server: server.to_string(),
            raw_len: 0,
            elapsed: Duration::ZERO,
            outcome: ProbeOutcome::Failed(error.to_string()),
        };
        probe.log();
        probe
    }

    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, ProbeOutcome::Parsed { .. })
    }

    fn log(&self) {
        match &self.outcome {
            ProbeOutcome::Parsed { expiry, .. } => debug!(
                server = %self.server,
                raw_len = self.raw_len,
                elapsed_ms = self.elapsed.as_millis() as u64,
                %expiry,
                "WHOIS probe parsed"
            ),
            ProbeOutcome::Failed(reason) => debug!(
                server = %self.server,
                raw_len = self.raw_len,
                elapsed_ms = self.elapsed.as_millis() as u64,
                reason = %reason,
                "WHOIS probe failed"
            ),
        }
    }
}

pub struct WhoisResolver {
    client: WhoisClient,
    extractor: ExpiryExtractor,
    retry: RetryPolicy,
    backup_servers: Vec<String>,
    special: SpecialDomains,
}

impl Default for WhoisResolver {
    fn default() -> Self {
        Self::with_client(WhoisClient::default())
    }
}

impl WhoisResolver {
    pub fn new(transport: Arc<dyn WhoisTransport>) -> Self {
        Self::with_client(WhoisClient::new(transport))
    }

    pub fn with_client(client: WhoisClient) -> Self {
        Self {
            client,
            extractor: ExpiryExtractor::new(),
            retry: RetryPolicy::default(),
            backup_servers: Vec::new(),
            special: SpecialDomains::default(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Generic backups used by [`WhoisResolver::resolve_domain`].
    pub fn with_backup_servers(mut self, servers: Vec<String>) -> Self {
        self.backup_servers = servers;
        self
    }

    pub fn with_special_domains(mut self, special: SpecialDomains) -> Self {
        self.special = special;
        self
    }

    pub fn with_extractor(mut self, extractor: ExpiryExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Resolve with this resolver's own backup list and retry policy.
    pub async fn resolve_domain(&self, domain: &str, timeout: Duration) -> DomainRecord {
        self.resolve_with(domain, timeout, &self.backup_servers, &self.retry)
            .await
    }

    #[instrument(skip(self, backups, policy), fields(domain = %domain))]
    async fn resolve_with(
        &self,
        domain: &str,
        timeout: Duration,
        backups: &[String],
        policy: &RetryPolicy,
    ) -> DomainRecord {
        let normalized = match normalize_domain(domain) {
            Ok(normalized) => normalized,
            Err(e) => {
                warn!(error = %e, "Skipping invalid domain");
                return DomainRecord::failed(domain, e, Utc::now());
            }
        };

        if let Some(estimator) = self.special.get(&normalized) {
            let mut probes = Vec::new();
            return match self.standard(&normalized, timeout, &mut probes).await {
                Ok((extraction, method)) => record(domain, extraction, method),
                Err(e) => {
                    let now = Utc::now();
                    let expiry = estimator.estimate(&normalized, now);
                    warn!(error = %e, %expiry, "Standard WHOIS failed for special-case domain, using estimate");
                    DomainRecord::resolved(domain, expiry, None, ResolutionMethod::Estimated, now)
                }
            };
        }

        let executor = RetryExecutor::new(policy.clone());
        let normalized = normalized.as_str();
        let outcome = executor
            .execute(|attempt| async move {
                if attempt > 1 {
                    info!(attempt, "Retrying WHOIS resolution");
                }
                self.attempt(normalized, timeout, backups).await
            })
            .await;

        match outcome {
            Ok((extraction, method)) => {
                debug!(method = %method, expiry = %extraction.expiry, "Resolved expiry");
                record(domain, extraction, method)
            }
            Err(e) => {
                warn!(error = %e, "Could not resolve expiry");
                DomainRecord::failed(domain, e, Utc::now())
            }
        }
    }

    /// Standard chain, then every backup server once.
    async fn attempt(
        &self,
        domain: &str,
        timeout: Duration,
        backups: &[String],
    ) -> Result<(Extraction, ResolutionMethod)> {
        let mut probes = Vec::new();

        let mut last_error = match self.standard(domain, timeout, &mut probes).await {
            Ok(resolved) => return Ok(resolved),
            Err(e) => {
                debug!(error = %e, "Standard WHOIS lookup failed, trying backup servers");
                e
            }
        };
        let mut transient = last_error.is_transport();

        for server in backup_candidates(domain, backups) {
            match self.backup(&server, domain, timeout, &mut probes).await {
                Ok(resolved) => {
                    info!(server = %server, "Resolved through backup server");
                    return Ok(resolved);
                }
                Err(e) => {
                    transient |= e.is_transport();
                    last_error = e;
                }
            }
        }

        debug!(
            probes = probes.len(),
            parsed = probes.iter().filter(|p| p.succeeded()).count(),
            "All WHOIS strategies failed"
        );
        Err(WatchError::StrategiesExhausted {
            domain: domain.to_string(),
            last_error: last_error.to_string(),
            transient,
        })
    }

    /// Registry chain; the deepest answer is tried first.
    async fn standard(
        &self,
        domain: &str,
        timeout: Duration,
        probes: &mut Vec<WhoisProbeResult>,
    ) -> Result<(Extraction, ResolutionMethod)> {
        let exchanges = match self.client.lookup(domain, timeout).await {
            Ok(exchanges) => exchanges,
            Err(e) => {
                probes.push(WhoisProbeResult::transport_failure("registry", &e));
                return Err(e);
            }
        };

        let mut last_error = WatchError::ExpiryNotFound;
        for exchange in exchanges.iter().rev() {
            let result = self.extractor.extract(&exchange.raw);
            probes.push(WhoisProbeResult::from_exchange(exchange, &result));
            match result {
                Ok(extraction) => {
                    let method = match extraction.source {
                        ExtractionSource::Structured => ResolutionMethod::Standard,
                        ExtractionSource::Manual => ResolutionMethod::ManualParse,
                    };
                    return Ok((extraction, method));
                }
                Err(e) => last_error = e,
            }
        }
        Err(last_error)
    }

    async fn backup(
        &self,
        server: &str,
        domain: &str,
        timeout: Duration,
        probes: &mut Vec<WhoisProbeResult>,
    ) -> Result<(Extraction, ResolutionMethod)> {
        let exchange = match self.client.query_server(server, domain, timeout).await {
            Ok(exchange) => exchange,
            Err(e) => {
                probes.push(WhoisProbeResult::transport_failure(server, &e));
                return Err(e);
            }
        };

        let result = self.extractor.extract(&exchange.raw);
        probes.push(WhoisProbeResult::from_exchange(&exchange, &result));
        result.map(|extraction| (extraction, ResolutionMethod::Backup(server.to_string())))
    }
}

#[async_trait]
impl DomainResolver for WhoisResolver {
    async fn resolve(&self, domain: &str, config: &LiveConfig) -> DomainRecord {
        let policy = self.retry.clone().with_max_attempts(config.retry_attempts);
        self.resolve_with(domain, config.timeout, &config.backup_whois_servers, &policy)
            .await
    }
}

fn record(domain: &str, extraction: Extraction, method: ResolutionMethod) -> DomainRecord {
    DomainRecord::resolved(
        domain,
        extraction.expiry,
        extraction.registrar,
        method,
        Utc::now(),
    )
}

/// TLD-preferred servers first, then the configured list, without repeats.
pub fn backup_candidates(domain: &str, configured: &[String]) -> Vec<String> {
    let preferred = get_tld(domain).map(get_backup_servers).unwrap_or(&[]);

    let mut candidates: Vec<String> = Vec::new();
    for server in preferred
        .iter()
        .map(|s| s.to_string())
        .chain(configured.iter().map(|s| s.trim().to_lowercase()))
    {
        if !server.is_empty() && !candidates.contains(&server) {
            candidates.push(server);
        }
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const EXAMPLE_COM: &str = "   Domain Name: EXAMPLE.COM\n   Registrar: RESERVED-Internet Assigned Numbers Authority\n   Registry Expiry Date: 2030-08-13T04:00:00Z\n";

    /// Canned answers by server; unknown servers answer with nothing.
    #[derive(Default)]
    struct CannedTransport {
        replies: HashMap<String, String>,
        calls: Mutex<Vec<String>>,
    }

    impl CannedTransport {
        fn with(mut self, server: &str, reply: &str) -> Self {
            self.replies.insert(server.to_string(), reply.to_string());
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl WhoisTransport for CannedTransport {
        async fn query(&self, server: &str, _query: &str, _budget: Duration) -> Result<String> {
            self.calls.lock().unwrap().push(server.to_string());
            self.replies
                .get(server)
                .cloned()
                .ok_or_else(|| WatchError::EmptyResponse(server.to_string()))
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy::new().with_unit(Duration::from_millis(1))
    }

    fn resolver(transport: Arc<CannedTransport>) -> WhoisResolver {
        WhoisResolver::new(transport).with_retry_policy(fast_retry())
    }

    #[tokio::test]
    async fn test_standard_resolution() {
        let transport = Arc::new(CannedTransport::default().with("whois.verisign-grs.com", EXAMPLE_COM));
        let record = resolver(transport)
            .resolve_domain("example.com", Duration::from_secs(5))
            .await;

        assert!(record.valid);
        assert_eq!(record.expiry_time.unwrap().to_rfc3339(), "2030-08-13T04:00:00+00:00");
        assert_eq!(record.resolution_method, Some(ResolutionMethod::Standard));
        assert_eq!(
            record.registrar.as_deref(),
            Some("RESERVED-Internet Assigned Numbers Authority")
        );
    }

    #[tokio::test]
    async fn test_registrar_answer_preferred_then_registry_fallback() {
        let registry = "Domain Name: SHOP.COM\nRegistrar WHOIS Server: whois.registrar.test\nRegistry Expiry Date: 2030-01-01T00:00:00Z\n";
        let transport = Arc::new(
            CannedTransport::default()
                .with("whois.verisign-grs.com", registry)
                .with("whois.registrar.test", "Registrar Registration Expiration Date: 2031-02-02T00:00:00Z\n"),
        );
        let record = resolver(transport.clone())
            .resolve_domain("shop.com", Duration::from_secs(5))
            .await;
        assert_eq!(record.expiry_time.unwrap().to_rfc3339(), "2031-02-02T00:00:00+00:00");

        let unhelpful = Arc::new(
            CannedTransport::default()
                .with("whois.verisign-grs.com", registry)
                .with("whois.registrar.test", "Terms of use: be nice\n"),
        );
        let record = resolver(unhelpful)
            .resolve_domain("shop.com", Duration::from_secs(5))
            .await;
        assert_eq!(record.expiry_time.unwrap().to_rfc3339(), "2030-01-01T00:00:00+00:00");
        assert_eq!(record.resolution_method, Some(ResolutionMethod::Standard));
    }

    #[tokio::test]
    async fn test_manual_parse_tag() {
        let transport = Arc::new(CannedTransport::default().with(
            "whois.verisign-grs.com",
            "Domain Name: ODD.COM\nExpiration Date: 2030-08-13 04:00:00 (GMT+0)\n",
        ));
        let record = resolver(transport)
            .resolve_domain("odd.com", Duration::from_secs(5))
            .await;
        assert!(record.valid);
        assert_eq!(record.resolution_method, Some(ResolutionMethod::ManualParse));
    }

    #[tokio::test]
    async fn test_backup_server_after_standard_failure() {
        let transport = Arc::new(CannedTransport::default().with("whois.backup.test", EXAMPLE_COM));
        let record = resolver(transport.clone())
            .with_backup_servers(vec!["whois.backup.test".into(), "WHOIS.BACKUP.TEST".into()])
            .resolve_domain("example.com", Duration::from_secs(5))
            .await;

        assert!(record.valid);
        assert_eq!(
            record.resolution_method,
            Some(ResolutionMethod::Backup("whois.backup.test".into()))
        );
        let calls = transport.calls();
        assert_eq!(calls.first().map(String::as_str), Some("whois.verisign-grs.com"));
        assert_eq!(calls.last().map(String::as_str), Some("whois.backup.test"));
    }

    #[tokio::test]
    async fn test_unknown_tld_fails_with_sentinel() {
        let transport = Arc::new(CannedTransport::default());
        let record = resolver(transport.clone())
            .resolve_domain("badtld.xx", Duration::from_secs(5))
            .await;

        assert!(!record.valid);
        assert_eq!(record.days_remaining, -999);
        assert!(record.resolution_method.is_none());
        assert!(!record.last_error.unwrap_or_default().is_empty());
        // Empty answers are transient: three attempts, each asking IANA.
        assert_eq!(
            transport.calls().iter().filter(|s| *s == "whois.iana.org").count(),
            3
        );
    }

    #[tokio::test]
    async fn test_parse_failures_are_not_retried() {
        let transport = Arc::new(
            CannedTransport::default().with("whois.verisign-grs.com", "Domain Name: X.COM\nStatus: ok\n"),
        );
        let record = resolver(transport.clone())
            .resolve_domain("x.com", Duration::from_secs(5))
            .await;
        assert!(!record.valid);
        // One standard lookup plus the verisign backup, once.
        assert_eq!(transport.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_special_domain_estimate() {
        let transport = Arc::new(CannedTransport::default());
        let record = resolver(transport.clone())
            .resolve_domain("github.com", Duration::from_secs(5))
            .await;

        assert!(record.valid);
        assert_eq!(record.resolution_method, Some(ResolutionMethod::Estimated));
        assert!((364..=366).contains(&record.days_remaining));
        assert_eq!(transport.calls(), vec!["whois.verisign-grs.com"]);
    }

    #[tokio::test]
    async fn test_invalid_domain_never_queries() {
        let transport = Arc::new(CannedTransport::default());
        let record = resolver(transport.clone())
            .resolve_domain("not a domain", Duration::from_secs(5))
            .await;
        assert!(!record.valid);
        assert_eq!(record.name, "not a domain");
        assert!(transport.calls().is_empty());
    }

    struct FlakyTransport {
        failures_left: AtomicUsize,
    }

    #[async_trait]
    impl WhoisTransport for FlakyTransport {
        async fn query(&self, server: &str, _query: &str, _budget: Duration) -> Result<String> {
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(WatchError::Timeout(format!("{} did not answer", server)));
            }
            Ok(EXAMPLE_COM.to_string())
        }
    }

    #[tokio::test]
    async fn test_transient_failure_retried_through_config() {
        // First attempt: standard plus the verisign backup both time out.
        let transport = Arc::new(FlakyTransport {
            failures_left: AtomicUsize::new(2),
        });
        let resolver = WhoisResolver::new(transport).with_retry_policy(fast_retry());
        let config = LiveConfig {
            retry_attempts: 2,
            timeout: Duration::from_secs(5),
            ..LiveConfig::default()
        };

        let record = resolver.resolve("example.com", &config).await;
        assert!(record.valid);
        assert_eq!(record.resolution_method, Some(ResolutionMethod::Standard));
    }

    #[test]
    fn test_backup_candidates_order() {
        let configured = vec!["whois.extra.test".to_string(), "whois.verisign-grs.com".to_string()];
        assert_eq!(
            backup_candidates("example.com", &configured),
            vec!["whois.verisign-grs.com", "whois.extra.test"]
        );
        assert_eq!(
            backup_candidates("example.xx", &configured),
            vec!["whois.extra.test", "whois.verisign-grs.com"]
        );
    }
}
