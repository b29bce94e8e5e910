//! Shutdown coordination for the gateway.

use tokio::sync::broadcast;

/// Stops the gateway's HTTP server.
///
/// `main` hands one receiver to `HttpServer::run` and fires `trigger` from
/// the signal task on SIGINT or SIGTERM; tests fire it directly to stop a
/// gateway they started.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Receiver for the server's graceful-shutdown future.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Ask every receiver to stop. A no-op once the server has exited.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
