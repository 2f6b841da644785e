mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{config_for, harness, FakeTransport, EXAMPLE_COM};
use domwatch_core::metrics::{CHECK_STATUS, EXPIRY_DAYS};
use domwatch_core::{PassReason, RetryPolicy, WhoisResolver, FAILURE_SENTINEL_DAYS};

fn resolver(transport: Arc<FakeTransport>) -> Arc<WhoisResolver> {
    Arc::new(
        WhoisResolver::new(transport).with_retry_policy(RetryPolicy::new().with_unit(Duration::from_millis(1))),
    )
}

#[tokio::test]
async fn test_pass_resolves_example_com() {
    let transport = Arc::new(FakeTransport::default().with("whois.verisign-grs.com", EXAMPLE_COM));
    let h = harness(config_for(&["example.com"]), resolver(transport));

    let summary = h.orchestrator.run_pass(PassReason::Startup).await;
    assert_eq!(summary.valid, 1);

    let record = h.store.get("example.com").unwrap();
    assert!(record.valid);
    assert_eq!(record.last_error, None);
    assert_eq!(
        serde_json::to_value(&record).unwrap()["expiry_time"],
        "2030-08-13T04:00:00Z"
    );
    assert_eq!(record.resolution_method.unwrap().to_string(), "whois-standard");
    assert!(record.days_remaining > 0);

    let metrics = h.store.metrics();
    assert_eq!(metrics.value(CHECK_STATUS, "example.com"), Some(1.0));
    assert_eq!(
        metrics.value(EXPIRY_DAYS, "example.com"),
        Some(record.days_remaining as f64)
    );
}

#[tokio::test]
async fn test_unknown_tld_fails_with_sentinel() {
    let transport = Arc::new(FakeTransport::default());
    let h = harness(config_for(&["badtld.xx"]), resolver(transport.clone()));

    let summary = h.orchestrator.run_pass(PassReason::Startup).await;
    assert_eq!(summary.invalid, 1);

    let record = h.store.get("badtld.xx").unwrap();
    assert!(!record.valid);
    assert_eq!(record.days_remaining, FAILURE_SENTINEL_DAYS);
    assert!(record.expiry_time.is_none());
    assert!(!record.last_error.unwrap_or_default().is_empty());

    // Every attempt went to the registry discovery server and nothing answered.
    assert_eq!(transport.calls_to("whois.iana.org"), 3);
    assert_eq!(h.store.metrics().value(EXPIRY_DAYS, "badtld.xx"), Some(-999.0));
    assert_eq!(h.store.metrics().value(CHECK_STATUS, "badtld.xx"), Some(0.0));
}

#[tokio::test]
async fn test_backup_server_from_config() {
    let transport = Arc::new(FakeTransport::default().with("whois.backup.test", EXAMPLE_COM));
    let mut config = config_for(&["example.com"]);
    config.backup_whois_servers = vec!["whois.backup.test".to_string()];
    let h = harness(config, resolver(transport));

    h.orchestrator.run_pass(PassReason::Startup).await;

    let record = h.store.get("example.com").unwrap();
    assert!(record.valid);
    assert_eq!(
        record.resolution_method.unwrap().to_string(),
        "whois-backup:whois.backup.test"
    );
}
