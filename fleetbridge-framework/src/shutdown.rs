//! Process-wide shutdown signalling.
//!
//! A [`ShutdownTrigger`] is owned by the [`BridgeRunner`](crate::BridgeRunner);
//! every long-running loop holds a [`ShutdownSignal`] and selects on it around
//! each suspension point (stream receive, reconnect sleep, status interval).

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;

/// Create a connected trigger/signal pair.
pub fn shutdown_channel() -> (ShutdownTrigger, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, ShutdownSignal { rx })
}

/// Sending half: flips every [`ShutdownSignal`] to triggered.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    /// Signal shutdown. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Create a new signal bound to this trigger.
    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }
}

/// Receiving half, cheap to clone.
///
/// A dropped [`ShutdownTrigger`] counts as shutdown.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Whether shutdown has been requested.
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Wait until shutdown is requested.
    pub async fn triggered(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Sleep for `duration` unless shutdown comes first.
    ///
    /// Returns `true` if the full duration elapsed, `false` on shutdown.
    pub async fn sleep(&mut self, duration: Duration) -> bool {
        let elapsed = tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.triggered() => false,
        };
        elapsed && !self.is_triggered()
    }

    /// Drive `future` to completion unless shutdown comes first.
    pub async fn cancellable<F: Future>(&mut self, future: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.triggered() => None,
            output = future => Some(output),
        }
    }
}

/// Waits for a termination signal (SIGINT, SIGTERM or SIGQUIT on Unix, Ctrl-C elsewhere).
#[cfg(unix)]
pub async fn wait_for_os_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

/// Waits for a termination signal (SIGINT, SIGTERM or SIGQUIT on Unix, Ctrl-C elsewhere).
#[cfg(not(unix))]
pub async fn wait_for_os_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready, task};

    #[test]
    fn test_triggered_pending_until_trigger() {
        let (trigger, signal) = shutdown_channel();
        let mut signal = signal;
        let mut waiter = task::spawn(async move { signal.triggered().await });

        assert_pending!(waiter.poll());
        trigger.trigger();
        assert!(waiter.is_woken());
        assert_ready!(waiter.poll());
    }

    #[test]
    fn test_dropped_trigger_counts_as_shutdown() {
        let (trigger, signal) = shutdown_channel();
        assert!(!signal.is_triggered());
        drop(trigger);
        assert!(signal.is_triggered());
    }

    #[tokio::test]
    async fn test_sleep_interrupted() {
        let (trigger, mut signal) = shutdown_channel();
        trigger.trigger();
        assert!(!signal.sleep(Duration::from_secs(3600)).await);
    }

    #[tokio::test]
    async fn test_sleep_elapses() {
        let (_trigger, mut signal) = shutdown_channel();
        assert!(signal.sleep(Duration::from_millis(5)).await);
    }

    #[tokio::test]
    async fn test_cancellable() {
        let (trigger, mut signal) = shutdown_channel();
        assert_eq!(signal.cancellable(async { 7 }).await, Some(7));

        let mut other = trigger.signal();
        trigger.trigger();
        assert_eq!(other.cancellable(std::future::pending::<()>()).await, None);
    }
}
