//! Fixed-interval reconnection.
//!
//! [`ReconnectPolicy`] is the retry strategy: one connection attempt per
//! [`acquire`](ReconnectPolicy::acquire), a fixed wait between attempts, no
//! cap on the number of attempts. [`Reconnector`] applies it to a
//! [`ServiceClient`], rebinding the fresh handle into the existing client.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::OwnedSemaphorePermit;
use tracing::{debug, info, warn};

use crate::bus::Connector;
use crate::client::ServiceClient;
use crate::metrics::ErrorCounters;
use crate::shutdown::ShutdownSignal;

/// Default wait between connection attempts.
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(5);

/// Fixed backoff, unbounded retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    interval: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RECONNECT_INTERVAL)
    }
}

impl ReconnectPolicy {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Wait between attempts.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Make a single connection attempt.
    pub async fn acquire<C: Connector>(&self, connector: &C, server: &str) -> Option<C::Handle> {
        match connector.connect(server).await {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(server = %server, error = %e, "Connection attempt failed");
                None
            }
        }
    }
}

/// Applies a [`ReconnectPolicy`] against one server address.
pub struct Reconnector<C: Connector> {
    connector: Arc<C>,
    server: Arc<str>,
    policy: ReconnectPolicy,
    errors: ErrorCounters,
}

impl<C: Connector> Clone for Reconnector<C> {
    fn clone(&self) -> Self {
        Self {
            connector: self.connector.clone(),
            server: self.server.clone(),
            policy: self.policy,
            errors: self.errors.clone(),
        }
    }
}

impl<C: Connector> Reconnector<C> {
    pub fn new(
        connector: Arc<C>,
        server: impl Into<Arc<str>>,
        policy: ReconnectPolicy,
        errors: ErrorCounters,
    ) -> Self {
        Self {
            connector,
            server: server.into(),
            policy,
            errors,
        }
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn policy(&self) -> ReconnectPolicy {
        self.policy
    }

    /// Connect, trying immediately and then every interval until it works.
    ///
    /// Returns `None` only if shutdown is requested first.
    pub async fn connect(&self, shutdown: &mut ShutdownSignal) -> Option<C::Handle> {
        let mut attempt: u64 = 0;
        loop {
            attempt += 1;
            let acquired = shutdown
                .cancellable(self.policy.acquire(self.connector.as_ref(), &self.server))
                .await?;

            if let Some(handle) = acquired {
                debug!(server = %self.server, attempt, "Connected");
                return Some(handle);
            }

            if !shutdown.sleep(self.policy.interval).await {
                return None;
            }
        }
    }

    /// Wait an interval, reconnect, and rebind the new handle into `client`.
    ///
    /// Retries until a connection is obtained. Returns `false` only if
    /// shutdown is requested first.
    pub async fn reconnect(
        &self,
        client: &ServiceClient<C::Handle>,
        shutdown: &mut ShutdownSignal,
    ) -> bool {
        let mut attempt: u64 = 0;
        loop {
            if !shutdown.sleep(self.policy.interval).await {
                return false;
            }

            attempt += 1;
            let Some(acquired) = shutdown
                .cancellable(self.policy.acquire(self.connector.as_ref(), &self.server))
                .await
            else {
                return false;
            };

            if let Some(handle) = acquired {
                self.errors.record_reconnect();
                let generation = client.rebind(handle);
                info!(
                    server = %self.server,
                    channel = %client.channel(),
                    generation,
                    attempt,
                    "Reconnected server"
                );
                return true;
            }
        }
    }

    /// Reconnect `client` on a background task.
    ///
    /// Coalesced: nothing is scheduled while another reconnect of the same
    /// client is outstanding, or if the client was already rebound past
    /// `failed_generation`. A failure reported while a reconnect is
    /// outstanding is picked up once that reconnect finishes. Returns whether
    /// a reconnect was scheduled.
    pub fn schedule(
        &self,
        client: Arc<ServiceClient<C::Handle>>,
        failed_generation: u64,
        shutdown: ShutdownSignal,
    ) -> bool {
        client.report_failure(failed_generation);

        let Some(permit) = client.try_begin_reconnect() else {
            debug!(channel = %client.channel(), "Reconnect already in progress");
            return false;
        };

        let generation = client.generation();
        if client.take_failure() != Some(generation) {
            debug!(
                channel = %client.channel(),
                failed_generation,
                generation,
                "Client already rebound, skipping reconnect"
            );
            return false;
        }

        info!(
            channel = %client.channel(),
            delay_ms = self.policy.interval.as_millis() as u64,
            "Scheduling reconnect"
        );

        let this = self.clone();
        let mut shutdown = shutdown;
        tokio::spawn(async move {
            if this.reconnect(&client, &mut shutdown).await {
                this.release(client, permit, shutdown);
            }
        });
        true
    }

    /// Give up the reconnect permit, rescheduling if the new connection
    /// already failed while the permit was held.
    fn release(
        &self,
        client: Arc<ServiceClient<C::Handle>>,
        permit: OwnedSemaphorePermit,
        shutdown: ShutdownSignal,
    ) -> bool {
        drop(permit);

        let generation = client.generation();
        if client.pending_failure() != Some(generation) {
            return false;
        }

        debug!(channel = %client.channel(), generation, "New connection already failed");
        self.schedule(client, generation, shutdown)
    }
}
