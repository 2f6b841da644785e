use std::sync::{Arc, RwLock};

use futures::stream::{self, Stream};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::delta::ConfigDelta;
use super::settings::{ConfigLayers, EngineSettings};
use super::LiveConfig;
use crate::error::Result;
use crate::store::DomainStore;
use crate::trigger::CheckTrigger;

const UPDATE_CHANNEL_CAPACITY: usize = 16;

/// Owner of the live configuration.
///
/// Readers get an `Arc` snapshot that never changes underneath them;
/// updates swap the pointer as a whole.
pub struct ConfigCoordinator {
    layers: ConfigLayers,
    current: RwLock<Arc<LiveConfig>>,
    updates: broadcast::Sender<Arc<LiveConfig>>,
    store: Option<Arc<DomainStore>>,
    trigger: Option<CheckTrigger>,
}

impl ConfigCoordinator {
    /// Build the initial configuration from the static layers.
    pub fn new(layers: ConfigLayers) -> Result<Self> {
        let initial = layers.build(None)?;
        Ok(Self::with_initial(layers, initial))
    }

    pub fn with_initial(layers: ConfigLayers, initial: LiveConfig) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            layers,
            current: RwLock::new(Arc::new(initial)),
            updates,
            store: None,
            trigger: None,
        }
    }

    /// Records and series of dropped domains are removed from `store`.
    pub fn with_store(mut self, store: Arc<DomainStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Domain-list changes request a pass through `trigger`.
    pub fn with_trigger(mut self, trigger: CheckTrigger) -> Self {
        self.trigger = Some(trigger);
        self
    }

    pub fn current(&self) -> Arc<LiveConfig> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => {
                warn!("Config read lock poisoned, recovering");
                Arc::clone(&poisoned.into_inner())
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<LiveConfig>> {
        self.updates.subscribe()
    }

    /// Accepted configurations, in order. A slow consumer skips ahead to
    /// newer values rather than ending the stream.
    pub fn updates(&self) -> impl Stream<Item = Arc<LiveConfig>> + Send + 'static {
        stream::unfold(self.subscribe(), |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(config) => return Some((config, rx)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Config update consumer lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
    }

    /// Merge an external payload between the file and environment layers.
    ///
    /// A malformed payload is rejected whole and the current value kept.
    pub fn apply_payload(&self, payload: &str) -> Result<Option<ConfigDelta>> {
        let external = EngineSettings::from_payload(payload)?;
        let candidate = self.layers.build(Some(&external))?;
        Ok(self.replace(candidate))
    }

    /// Swap in `candidate` if it differs from the current value, then
    /// reconcile derived state.
    pub fn replace(&self, candidate: LiveConfig) -> Option<ConfigDelta> {
        let (old, new) = {
            let mut guard = match self.current.write() {
                Ok(guard) => guard,
                Err(poisoned) => {
                    warn!("Config write lock poisoned, recovering");
                    poisoned.into_inner()
                }
            };
            if **guard == candidate {
                debug!("Configuration unchanged");
                return None;
            }
            let new = Arc::new(candidate);
            let old = std::mem::replace(&mut *guard, Arc::clone(&new));
            (old, new)
        };

        let delta = ConfigDelta::between(&old, &new);
        if delta.is_empty() {
            // Only the source connection settings differ.
            return None;
        }
        info!("Configuration updated");
        delta.log();

        if delta.domains_changed() {
            if let Some(store) = &self.store {
                store.retain_domains(&new.domains);
            }
            match &self.trigger {
                Some(trigger) if trigger.startup_complete() => {
                    trigger.trigger();
                }
                Some(_) => debug!("Cold-start pass pending, not triggering"),
                None => {}
            }
        }

        // No receivers is fine.
        let _ = self.updates.send(new);
        Some(delta)
    }
}
