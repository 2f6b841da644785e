use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;
use tracing::debug;

#[derive(Debug, Default)]
struct TriggerState {
    pending: AtomicBool,
    startup_complete: AtomicBool,
    notify: Notify,
}

/// Single-slot request for an immediate check pass.
///
/// Cloning shares the slot. While a request is pending further requests are
/// dropped, so any burst of triggers yields at most one extra pass.
#[derive(Debug, Clone, Default)]
pub struct CheckTrigger {
    state: Arc<TriggerState>,
}

impl CheckTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a pass. Returns `false` when one was already pending.
    pub fn trigger(&self) -> bool {
        if self.state.pending.swap(true, Ordering::SeqCst) {
            debug!("Check already pending, dropping trigger");
            return false;
        }
        self.state.notify.notify_one();
        true
    }

    pub fn is_pending(&self) -> bool {
        self.state.pending.load(Ordering::SeqCst)
    }

    /// Wait for a request and take it, freeing the slot.
    pub async fn wait(&self) {
        self.state.notify.notified().await;
        self.state.pending.store(false, Ordering::SeqCst);
    }

    /// Set once the cold-start pass has finished.
    pub fn mark_startup_complete(&self) {
        self.state.startup_complete.store(true, Ordering::SeqCst);
    }

    pub fn startup_complete(&self) -> bool {
        self.state.startup_complete.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_triggers_coalesce() {
        let trigger = CheckTrigger::new();
        assert!(trigger.trigger());
        assert!(!trigger.trigger());
        assert!(trigger.is_pending());

        tokio::time::timeout(Duration::from_secs(1), trigger.wait())
            .await
            .unwrap();
        assert!(!trigger.is_pending());

        // The second request was dropped, so nothing else is waiting.
        assert!(tokio::time::timeout(Duration::from_millis(50), trigger.wait())
            .await
            .is_err());

        assert!(trigger.trigger());
    }

    #[test]
    fn test_startup_flag() {
        let trigger = CheckTrigger::new();
        let clone = trigger.clone();
        assert!(!clone.startup_complete());
        trigger.mark_startup_complete();
        assert!(clone.startup_complete());
    }
}
