//! Inbound supply subscription.
//!
//! The subscription cycles through [`SubscriptionState`]s:
//!
//! ```text
//! Connecting -> Streaming -> Failed -> Connecting -> ...
//! ```
//!
//! It has no terminal state; only shutdown ends it. Supplies are processed
//! one at a time in receipt order.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use fleetbridge_framework::{
    BridgeError, Connector, ErrorCounters, ErrorKind, Reconnector, Result, ServiceClient,
    ShutdownSignal, SupplyStream,
};

use crate::publisher::OutboundPublisher;
use crate::translator::translate;

/// Where the subscription is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Opening the supply stream.
    Connecting,
    /// Receiving supplies.
    Streaming,
    /// Stream ended; waiting to reconnect.
    Failed,
}

/// Consumes the inbound channel and feeds the [`OutboundPublisher`].
pub struct InboundSubscription<C: Connector> {
    client: Arc<ServiceClient<C::Handle>>,
    reconnector: Reconnector<C>,
    publisher: Arc<OutboundPublisher<C>>,
    errors: ErrorCounters,
    state: watch::Sender<SubscriptionState>,
}

impl<C: Connector> InboundSubscription<C> {
    pub fn new(
        client: Arc<ServiceClient<C::Handle>>,
        reconnector: Reconnector<C>,
        publisher: Arc<OutboundPublisher<C>>,
        errors: ErrorCounters,
    ) -> Self {
        let (state, _) = watch::channel(SubscriptionState::Connecting);
        Self {
            client,
            reconnector,
            publisher,
            errors,
            state,
        }
    }

    /// Watch the subscription state.
    pub fn state(&self) -> watch::Receiver<SubscriptionState> {
        self.state.subscribe()
    }

    pub fn client(&self) -> &Arc<ServiceClient<C::Handle>> {
        &self.client
    }

    /// Handle one inbound payload.
    ///
    /// Undecodable payloads are counted and skipped. Publish failures are
    /// accounted for by the publisher.
    pub async fn process(&self, payload: &[u8]) -> Result<()> {
        let fleet = match translate(payload) {
            Ok(fleet) => fleet,
            Err(e) => {
                self.errors.record(ErrorKind::Decode);
                debug!(key = %self.client.key(), error = %e, "Skipping undecodable supply");
                return Err(e.into());
            }
        };

        self.publisher.forward(&fleet).await.map(|_| ())
    }

    /// Subscribe and process supplies until shutdown, resubscribing after failures.
    pub async fn run(self, mut shutdown: ShutdownSignal) {
        loop {
            self.state.send_replace(SubscriptionState::Connecting);

            let stream = match shutdown.cancellable(self.client.subscribe()).await {
                None => break,
                Some(Ok(stream)) => stream,
                Some(Err(e)) => {
                    self.fail(&e);
                    if !self.reconnector.reconnect(&self.client, &mut shutdown).await {
                        break;
                    }
                    continue;
                }
            };

            self.state.send_replace(SubscriptionState::Streaming);
            info!(
                key = %self.client.key(),
                binding = %self.client.binding(),
                generation = self.client.generation(),
                "Subscribed to supplies"
            );

            let Some(cause) = self.stream(stream, &mut shutdown).await else {
                break;
            };

            self.fail(&cause);
            if !self.reconnector.reconnect(&self.client, &mut shutdown).await {
                break;
            }
        }

        debug!(key = %self.client.key(), "Subscription stopped");
    }

    /// Drain `stream` until it fails. Returns `None` on shutdown.
    async fn stream<S: SupplyStream>(
        &self,
        mut stream: S,
        shutdown: &mut ShutdownSignal,
    ) -> Option<BridgeError> {
        loop {
            match shutdown.cancellable(stream.next_supply()).await? {
                Ok(Some(payload)) => {
                    // Failures are already counted and logged
                    let _ = self.process(&payload).await;
                }
                Ok(None) => {
                    return Some(BridgeError::stream(self.client.key(), "closed by server"));
                }
                Err(e) => return Some(e),
            }
        }
    }

    fn fail(&self, cause: &BridgeError) {
        self.state.send_replace(SubscriptionState::Failed);
        self.errors.record(ErrorKind::Stream);
        warn!(
            key = %self.client.key(),
            error = %cause,
            delay_ms = self.reconnector.policy().interval().as_millis() as u64,
            "Supply stream failed, reconnecting"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use fleetbridge_common::{Content, Format, PtService, Supply, encode};
    use fleetbridge_framework::memory::MemoryBus;
    use fleetbridge_framework::{
        BindingDescriptor, Channel, LivenessCounter, ReconnectPolicy, shutdown_channel,
    };

    const INBOUND: &str = "fleetbridge/pt_service";
    const OUTBOUND: &str = "fleetbridge/ride_share";

    async fn subscription(bus: &MemoryBus) -> (InboundSubscription<MemoryBus>, LivenessCounter) {
        let counter = LivenessCounter::new();
        let errors = ErrorCounters::new();
        let reconnector = Reconnector::new(
            Arc::new(bus.clone()),
            "mem",
            ReconnectPolicy::new(Duration::from_millis(10)),
            errors.clone(),
        );
        let (_trigger, shutdown) = shutdown_channel();

        let publish_client = Arc::new(ServiceClient::new(
            bus.connect("mem").await.unwrap(),
            Channel::RideShare,
            OUTBOUND,
            BindingDescriptor::new("PT2Fleet", "Fleet"),
        ));
        let publisher = Arc::new(OutboundPublisher::new(
            publish_client,
            reconnector.clone(),
            counter.clone(),
            errors.clone(),
            shutdown,
        ));
        let subscribe_client = Arc::new(ServiceClient::new(
            bus.connect("mem").await.unwrap(),
            Channel::PtService,
            INBOUND,
            BindingDescriptor::new("PT2Fleet", "PTransit"),
        ));

        (
            InboundSubscription::new(subscribe_client, reconnector, publisher, errors),
            counter,
        )
    }

    fn payload(vehicle_id: &str) -> Vec<u8> {
        let pt = PtService {
            vehicle_id: vehicle_id.to_string(),
            lat: 35.0,
            lon: 135.0,
            angle: 0.0,
            speed: 20.0,
        };
        encode(
            &Supply::new("Transit:PT", "PT Supply", Content::from_message(&pt)),
            Format::Cbor,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_process_forwards() {
        let bus = MemoryBus::new();
        let (subscription, counter) = subscription(&bus).await;

        subscription.process(&payload("bus-1")).await.unwrap();

        assert_eq!(counter.snapshot(), 1);
        assert_eq!(bus.published(OUTBOUND).len(), 1);
    }

    #[tokio::test]
    async fn test_process_skips_garbage() {
        let bus = MemoryBus::new();
        let (subscription, counter) = subscription(&bus).await;

        let result = subscription.process(b"not a supply").await;

        assert!(matches!(result, Err(BridgeError::Decode(_))));
        assert_eq!(subscription.errors.snapshot().decode, 1);
        assert_eq!(counter.snapshot(), 0);
        assert!(bus.published(OUTBOUND).is_empty());
    }

    #[tokio::test]
    async fn test_state_transitions() {
        let bus = MemoryBus::new();
        let (subscription, _counter) = subscription(&bus).await;
        let mut state = subscription.state();
        assert_eq!(*state.borrow(), SubscriptionState::Connecting);

        let (trigger, shutdown) = shutdown_channel();
        let task = tokio::spawn(subscription.run(shutdown));

        state
            .wait_for(|s| *s == SubscriptionState::Streaming)
            .await
            .unwrap();

        bus.sever_subscriptions(INBOUND);
        state
            .wait_for(|s| *s == SubscriptionState::Failed)
            .await
            .unwrap();
        state
            .wait_for(|s| *s == SubscriptionState::Streaming)
            .await
            .unwrap();

        trigger.trigger();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("subscription did not stop")
            .unwrap();
    }
}
