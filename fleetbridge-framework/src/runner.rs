//! Bridge runner for lifecycle management.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::error::Result;
use crate::shutdown::{ShutdownSignal, ShutdownTrigger, shutdown_channel, wait_for_os_signal};

/// Default time tasks get to finish after shutdown is signalled.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Owns a bridge's worker tasks and its shutdown trigger.
///
/// Handles:
/// - Task spawning and tracking
/// - Graceful shutdown on SIGINT/SIGTERM
/// - Aborting tasks that outlive the grace period
///
/// # Example
///
/// ```ignore
/// use fleetbridge_framework::BridgeRunner;
///
/// let mut runner = BridgeRunner::new("PT2Fleet");
/// let shutdown = runner.shutdown_signal();
/// runner.spawn("worker", async move {
///     // Worker logic here, selecting on `shutdown`
/// });
/// runner.run().await?;
/// ```
pub struct BridgeRunner {
    /// Bridge name for logging.
    name: String,
    /// Bridge version.
    version: String,
    /// Shutdown sender; every worker holds a signal from it.
    trigger: ShutdownTrigger,
    /// Spawned tasks.
    tasks: Vec<(String, JoinHandle<()>)>,
    /// Time tasks get to exit on their own.
    grace: Duration,
}

impl BridgeRunner {
    pub fn new(name: impl Into<String>) -> Self {
        let (trigger, _) = shutdown_channel();
        Self {
            name: name.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            trigger,
            tasks: Vec::new(),
            grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Get the bridge name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the bridge version.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// A new signal that flips when this runner stops.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.trigger.signal()
    }

    /// Number of tracked tasks.
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Spawn a worker task.
    ///
    /// The task is tracked, given the grace period on shutdown, then aborted.
    pub fn spawn<F>(&mut self, name: impl Into<String>, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        tracing::debug!(bridge = %self.name, worker = %name, "Spawning worker");
        self.tasks.push((name, tokio::spawn(future)));
    }

    /// Run until SIGINT/SIGTERM, then stop.
    pub async fn run(self) -> Result<()> {
        tracing::info!(
            bridge = %self.name,
            version = %self.version,
            tasks = self.tasks.len(),
            "Bridge running. Press Ctrl+C to stop."
        );

        if let Err(e) = wait_for_os_signal().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signals");
        }

        tracing::info!(bridge = %self.name, "Received shutdown signal");
        self.stop().await;
        Ok(())
    }

    /// Signal shutdown, wait up to the grace period for tasks, abort the rest.
    pub async fn stop(self) {
        self.trigger.trigger();

        let deadline = tokio::time::Instant::now() + self.grace;
        for (name, mut task) in self.tasks {
            match tokio::time::timeout_at(deadline, &mut task).await {
                Ok(Ok(())) => tracing::debug!(worker = %name, "Worker stopped"),
                Ok(Err(e)) if e.is_panic() => {
                    tracing::error!(worker = %name, error = %e, "Worker panicked")
                }
                Ok(Err(_)) => {}
                Err(_) => {
                    tracing::warn!(worker = %name, "Worker did not stop in time, aborting");
                    task.abort();
                }
            }
        }

        tracing::info!(bridge = %self.name, "Goodbye!");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn test_stop_signals_workers() {
        let mut runner = BridgeRunner::new("test");
        let mut shutdown = runner.shutdown_signal();
        let finished = Arc::new(AtomicBool::new(false));

        let flag = finished.clone();
        runner.spawn("waiter", async move {
            shutdown.triggered().await;
            flag.store(true, Ordering::SeqCst);
        });
        assert_eq!(runner.task_count(), 1);

        runner.stop().await;
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_stop_aborts_stragglers() {
        let mut runner = BridgeRunner::new("test").with_grace(Duration::from_millis(20));
        runner.spawn("sleeper", async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });

        tokio::time::timeout(Duration::from_secs(1), runner.stop())
            .await
            .expect("stop should not wait for a stuck worker");
    }

    #[test]
    fn test_version_override() {
        let runner = BridgeRunner::new("test").with_version("9.9.9");
        assert_eq!(runner.name(), "test");
        assert_eq!(runner.version(), "9.9.9");
    }
}
