//! Cooperative cancellation for the probing loops.

use core::future;

use tokio::signal;
use tokio::sync::watch;

/// Construct a new shutdown pair.
pub fn channel() -> (Trigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (Trigger { tx }, Shutdown { rx })
}

/// Construct a shutdown which is triggered by the first interrupt signal
/// received by the process.
pub fn ctrl_c() -> Shutdown {
    let (trigger, shutdown) = channel();

    tokio::spawn(async move {
        if let Err(error) = signal::ctrl_c().await {
            tracing::warn!(%error, "failed to listen for interrupt signal");
            return;
        }

        tracing::debug!("interrupted");
        trigger.trigger();
    });

    shutdown
}

/// The sending half used to request a shutdown.
pub struct Trigger {
    tx: watch::Sender<bool>,
}

impl Trigger {
    /// Request that everything waiting on the associated [`Shutdown`] stops.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

/// Observes whether a shutdown has been requested.
#[derive(Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    /// A shutdown which is never triggered.
    pub fn never() -> Self {
        channel().1
    }

    /// Test if shutdown has been requested.
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until shutdown has been requested.
    ///
    /// If the [`Trigger`] is dropped without being triggered this never
    /// completes.
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();

        if rx.wait_for(|triggered| *triggered).await.is_err() {
            future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use core::time::Duration;

    use tokio::time;

    use super::{Shutdown, channel};

    #[tokio::test(start_paused = true)]
    async fn trigger_wakes_waiters() {
        let (trigger, shutdown) = channel();
        assert!(!shutdown.is_triggered());

        let waiter = tokio::spawn({
            let shutdown = shutdown.clone();
            async move { shutdown.wait().await }
        });

        trigger.trigger();
        waiter.await.unwrap();
        assert!(shutdown.is_triggered());

        // Already triggered completes immediately.
        shutdown.wait().await;
    }

    #[tokio::test(start_paused = true)]
    async fn never_does_not_complete() {
        let shutdown = Shutdown::never();
        let result = time::timeout(Duration::from_secs(60), shutdown.wait()).await;
        assert!(result.is_err());
        assert!(!shutdown.is_triggered());
    }
}
