//! Outbound publishing of fleet supplies.

use std::sync::Arc;

use tracing::{error, trace, warn};

use fleetbridge_common::{Fleet, Format};
use fleetbridge_framework::{
    Ack, BusHandle, Connector, ErrorCounters, LivenessCounter, Reconnector, Result, ServiceClient,
    ShutdownSignal,
};

use crate::translator::encode_supply;

/// Publishes translated supplies on the outbound channel.
///
/// A failed publish drops the supply and schedules a reconnect of the
/// publish client. Reconnects are coalesced per client.
pub struct OutboundPublisher<C: Connector> {
    client: Arc<ServiceClient<C::Handle>>,
    reconnector: Reconnector<C>,
    counter: LivenessCounter,
    errors: ErrorCounters,
    format: Format,
    supply_name: String,
    shutdown: ShutdownSignal,
}

impl<C: Connector> OutboundPublisher<C> {
    pub fn new(
        client: Arc<ServiceClient<C::Handle>>,
        reconnector: Reconnector<C>,
        counter: LivenessCounter,
        errors: ErrorCounters,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            client,
            reconnector,
            counter,
            errors,
            format: Format::default(),
            supply_name: "Fleet Supply".to_string(),
            shutdown,
        }
    }

    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    pub fn with_supply_name(mut self, name: impl Into<String>) -> Self {
        self.supply_name = name.into();
        self
    }

    pub fn client(&self) -> &Arc<ServiceClient<C::Handle>> {
        &self.client
    }

    /// Publish one fleet position.
    ///
    /// On success the liveness counter is incremented. Failures are counted
    /// and logged here; the returned error is informational.
    pub async fn forward(&self, fleet: &Fleet) -> Result<Ack> {
        let sender = self.client.binding().name();
        let payload = match encode_supply(fleet, &sender, &self.supply_name, self.format) {
            Ok(payload) => payload,
            Err(e) => {
                self.errors.record(e.kind());
                error!(vehicle_id = %fleet.vehicle_id, error = %e, "Failed to encode fleet supply");
                return Err(e);
            }
        };

        let (handle, generation) = self.client.current();
        match handle.notify(self.client.key(), payload).await {
            Ok(()) => {
                let count = self.counter.increment();
                trace!(
                    vehicle_id = %fleet.vehicle_id,
                    key = %self.client.key(),
                    count,
                    "Forwarded fleet supply"
                );
                Ok(Ack { generation })
            }
            Err(e) => {
                self.errors.record(e.kind());
                warn!(
                    vehicle_id = %fleet.vehicle_id,
                    generation,
                    error = %e,
                    "Failed to publish fleet supply, dropping it"
                );
                self.reconnector
                    .schedule(self.client.clone(), generation, self.shutdown.clone());
                Err(e)
            }
        }
    }
}
