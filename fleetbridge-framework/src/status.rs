//! Node status reporting.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::bus::{BusHandle, StatusSink};
use crate::client::ServiceClient;
use crate::error::Result;
use crate::metrics::{ErrorCounters, ErrorSnapshot, LivenessCounter};
use crate::shutdown::ShutdownSignal;

/// Default interval between status reports.
pub const DEFAULT_STATUS_INTERVAL: Duration = Duration::from_secs(3);

/// Default label attached to the forwarded count.
pub const DEFAULT_STATUS_LABEL: &str = "<-count";

/// Node lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    Running,
    Offline,
}

/// Status report emitted to a [`StatusSink`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeStatus {
    /// Node (service) name.
    pub node: String,
    /// Bridge version.
    pub version: String,
    /// Current state.
    pub state: NodeState,
    /// Supplies forwarded so far.
    pub count: u64,
    /// Label the count is reported under.
    pub label: String,
    /// Per-kind error counts.
    pub errors: ErrorSnapshot,
    /// Unix epoch milliseconds.
    pub timestamp: i64,
}

/// [`StatusSink`] that publishes JSON status on a fixed key.
///
/// Rides on a [`ServiceClient`]'s connection, so it follows rebinds of that client.
pub struct BusStatusSink<H> {
    client: Arc<ServiceClient<H>>,
    key: String,
}

impl<H: BusHandle> BusStatusSink<H> {
    pub fn new(client: Arc<ServiceClient<H>>, key: impl Into<String>) -> Self {
        Self {
            client,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl<H: BusHandle> StatusSink for BusStatusSink<H> {
    async fn set_status(&self, status: &NodeStatus) -> Result<()> {
        let payload = serde_json::to_vec(status)?;
        let (handle, _) = self.client.current();
        handle.notify(&self.key, payload).await
    }
}

/// Periodically reports the [`LivenessCounter`] to a [`StatusSink`].
pub struct StatusReporter<S> {
    sink: S,
    node: String,
    version: String,
    label: String,
    interval: Duration,
    counter: LivenessCounter,
    errors: ErrorCounters,
}

impl<S: StatusSink> StatusReporter<S> {
    pub fn new(
        sink: S,
        node: impl Into<String>,
        counter: LivenessCounter,
        errors: ErrorCounters,
    ) -> Self {
        Self {
            sink,
            node: node.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            label: DEFAULT_STATUS_LABEL.to_string(),
            interval: DEFAULT_STATUS_INTERVAL,
            counter,
            errors,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Build the current status.
    pub fn snapshot(&self, state: NodeState) -> NodeStatus {
        NodeStatus {
            node: self.node.clone(),
            version: self.version.clone(),
            state,
            count: self.counter.snapshot(),
            label: self.label.clone(),
            errors: self.errors.snapshot(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Emit one report. Sink failures are logged, never propagated.
    pub async fn report(&self, state: NodeState) {
        let status = self.snapshot(state);
        match self.sink.set_status(&status).await {
            Ok(()) => tracing::trace!(
                node = %status.node,
                count = status.count,
                label = %status.label,
                "Status reported"
            ),
            Err(e) => tracing::warn!(error = %e, "Failed to report status"),
        }
    }

    /// Report every interval until shutdown, then report once more as offline.
    pub async fn run(self, mut shutdown: ShutdownSignal) {
        loop {
            self.report(NodeState::Running).await;
            if !shutdown.sleep(self.interval).await {
                break;
            }
        }

        self.report(NodeState::Offline).await;
        tracing::debug!(node = %self.node, "Status reporter stopped");
    }
}
