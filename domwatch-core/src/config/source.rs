use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::coordinator::ConfigCoordinator;
use super::delta::ConfigDelta;
use crate::error::{Result, WatchError};

/// A remote place configuration payloads come from.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Fetch the current payload. [`WatchError::SourceEmpty`] means the
    /// source answered but holds nothing.
    async fn fetch(&self) -> Result<String>;

    fn poll_interval(&self) -> Duration;

    fn name(&self) -> &str {
        "config source"
    }
}

/// Fetch once and hand the payload to the coordinator.
///
/// Outages, empty answers and rejected payloads all leave the current
/// configuration in place.
pub async fn poll_once(source: &dyn ConfigSource, coordinator: &ConfigCoordinator) -> Option<ConfigDelta> {
    apply_fetched(source.name(), source.fetch().await, coordinator)
}

fn apply_fetched(
    source: &str,
    fetched: Result<String>,
    coordinator: &ConfigCoordinator,
) -> Option<ConfigDelta> {
    match fetched {
        Ok(payload) => match coordinator.apply_payload(&payload) {
            Ok(delta) => delta,
            Err(e) => {
                error!(source, error = %e, "Rejected configuration payload, keeping current configuration");
                None
            }
        },
        Err(WatchError::SourceEmpty) => {
            warn!(source, "Configuration source has no content, keeping current configuration");
            None
        }
        Err(e) => {
            warn!(source, error = %e, "Configuration source unavailable, keeping current configuration");
            None
        }
    }
}

/// Poll `source` until shutdown, skipping payloads identical to the last one.
pub async fn watch_source(
    source: Arc<dyn ConfigSource>,
    coordinator: Arc<ConfigCoordinator>,
    mut shutdown: watch::Receiver<bool>,
) {
    let interval = source.poll_interval();
    info!(source = source.name(), interval_secs = interval.as_secs(), "Watching configuration source");
    let mut last_payload: Option<String> = None;

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                debug!(source = source.name(), "Stopping configuration watch");
                break;
            }
            _ = tokio::time::sleep(interval) => {}
        }

        let fetched = source.fetch().await;
        if let Ok(payload) = &fetched {
            if last_payload.as_deref() == Some(payload.as_str()) {
                debug!(source = source.name(), "Payload unchanged");
                continue;
            }
            last_payload = Some(payload.clone());
        }
        apply_fetched(source.name(), fetched, &coordinator);
    }
}
