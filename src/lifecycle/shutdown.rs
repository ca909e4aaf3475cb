//! Shutdown coordination for the balancer.
//!
//! One `Shutdown` is created by the binary and cloned into the signal task
//! and `HttpServer::run`. Each subscription is one piece that has to stop:
//! the listener's graceful drain and the health monitor loop.

use tokio::sync::broadcast;

/// Fan-out stop signal for the listener and the health monitor.
///
/// Clones share one channel, so any clone may trigger it. Firing with no
/// subscribers is a no-op.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        // A single unit message; nobody needs to see more than one.
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// New stop receiver; hand one to each long-running task.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Tasks still holding a receiver. Zero once the server and monitor
    /// have both exited.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
