//! Shutdown coordination for the bridge.

use tokio::sync::broadcast;

/// Coordinator for graceful shutdown.
///
/// The server and test harnesses hold a receiver. In-flight calls finish on
/// their own tasks after the listener stops accepting.
#[derive(Clone)]
pub struct Shutdown {
    /// Broadcast channel sender.
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Fire the shutdown signal. Safe to call with no subscribers and more than once.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Number of receivers still waiting on the signal.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
