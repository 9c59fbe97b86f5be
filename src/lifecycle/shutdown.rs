//! Signal handling for graceful shutdown

use std::io;
use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tracing::debug;

/// Resolves on SIGTERM, SIGINT or a programmatic [`trigger`](ShutdownSignal::trigger)
#[derive(Clone, Default)]
pub struct ShutdownSignal {
    manual: Arc<Notify>,
}

impl ShutdownSignal {
    /// Create a new shutdown signal handler
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown without an OS signal
    pub fn trigger(&self) {
        self.manual.notify_one();
    }

    /// Wait for a shutdown request, returning what caused it
    pub async fn wait(&self) -> io::Result<&'static str> {
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        let cause = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
            _ = self.manual.notified() => "trigger",
        };
        debug!(cause, "shutdown requested");
        Ok(cause)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_trigger_resolves_wait() {
        let shutdown = ShutdownSignal::new();
        let waiter = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { shutdown.wait().await })
        };

        shutdown.trigger();
        let cause = tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(cause, "trigger");
    }
}
