//! Process-wide stop signal.
//!
//! Every supervised unit holds a clone of the token, polls it at loop
//! boundaries, and can await it at suspension points. Triggering is
//! idempotent and never un-set.

use std::sync::Arc;
use tokio::sync::watch;

/// Clonable cancellation token backed by a watch channel.
#[derive(Debug, Clone)]
pub struct ShutdownToken {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownToken {
    /// Creates a new, untriggered token.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Signals shutdown to every clone of this token.
    pub fn trigger(&self) {
        // send_replace works even when no receiver is currently subscribed
        self.tx.send_replace(true);
    }

    /// True once shutdown has been triggered.
    #[must_use]
    pub fn is_set(&self) -> bool {
        *self.tx.subscribe().borrow()
    }

    /// Waits until shutdown is triggered. Returns immediately if it already was.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for ShutdownToken {
    fn default() -> Self {
        Self::new()
    }
}
