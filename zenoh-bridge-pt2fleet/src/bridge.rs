//! Bridge bootstrap: registration, connections and task wiring.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use fleetbridge_framework::{
    BridgeError, BridgeRunner, BusStatusSink, Connector, Directory, ErrorCounters,
    LivenessCounter, ReconnectPolicy, Reconnector, Result, ServiceClient, StatusReporter,
};

use crate::config::BridgeSettings;
use crate::publisher::OutboundPublisher;
use crate::subscription::{InboundSubscription, SubscriptionState};

/// Shared state of a started bridge.
pub struct BridgeHandles<C: Connector> {
    /// Server address handed out by the directory.
    pub server: String,
    /// Supplies forwarded so far.
    pub counter: LivenessCounter,
    /// Per-kind error counts.
    pub errors: ErrorCounters,
    /// Inbound subscription state.
    pub subscription_state: watch::Receiver<SubscriptionState>,
    /// Client reading the inbound channel.
    pub subscriber: Arc<ServiceClient<C::Handle>>,
    /// Client writing the outbound channel.
    pub publisher: Arc<ServiceClient<C::Handle>>,
}

/// Register with `directory`, connect both clients and spawn the workers on `runner`.
///
/// Registration failure is returned immediately. Connections are retried
/// every reconnect interval until they succeed or the runner stops.
pub async fn start<C, D>(
    runner: &mut BridgeRunner,
    settings: &BridgeSettings,
    connector: Arc<C>,
    directory: &D,
) -> Result<BridgeHandles<C>>
where
    C: Connector,
    D: Directory,
{
    let keys = settings.keys();
    let channels = [settings.inbound_channel, settings.outbound_channel];

    let server = directory.register(&settings.service_name, &channels).await?;
    info!(service = %settings.service_name, server = %server, "Connecting to server");

    let counter = LivenessCounter::new();
    let errors = ErrorCounters::new();
    let reconnector = Reconnector::new(
        connector,
        server.as_str(),
        ReconnectPolicy::new(settings.reconnect_interval()),
        errors.clone(),
    );

    let mut shutdown = runner.shutdown_signal();
    let stopped = || BridgeError::connection(&server, "shutdown before connecting");
    let subscribe_handle = reconnector.connect(&mut shutdown).await.ok_or_else(stopped)?;
    let publish_handle = reconnector.connect(&mut shutdown).await.ok_or_else(stopped)?;

    let subscriber = Arc::new(ServiceClient::new(
        subscribe_handle,
        settings.inbound_channel,
        keys.channel(settings.inbound_channel),
        settings.inbound_binding(),
    ));
    let publisher = Arc::new(ServiceClient::new(
        publish_handle,
        settings.outbound_channel,
        keys.channel(settings.outbound_channel),
        settings.outbound_binding(),
    ));

    let outbound = Arc::new(
        OutboundPublisher::new(
            publisher.clone(),
            reconnector.clone(),
            counter.clone(),
            errors.clone(),
            runner.shutdown_signal(),
        )
        .with_format(settings.serialization)
        .with_supply_name(&settings.supply_name),
    );

    let subscription = InboundSubscription::new(
        subscriber.clone(),
        reconnector,
        outbound,
        errors.clone(),
    );
    let subscription_state = subscription.state();
    runner.spawn("subscription", subscription.run(runner.shutdown_signal()));

    let sink = BusStatusSink::new(publisher.clone(), keys.status(&settings.service_name));
    let reporter = StatusReporter::new(sink, &settings.service_name, counter.clone(), errors.clone())
        .with_label(&settings.status_label)
        .with_interval(settings.status_interval())
        .with_version(runner.version());
    runner.spawn("status", reporter.run(runner.shutdown_signal()));

    info!(
        service = %settings.service_name,
        inbound = %subscriber.key(),
        outbound = %publisher.key(),
        format = ?settings.serialization,
        "Bridge started"
    );

    Ok(BridgeHandles {
        server,
        counter,
        errors,
        subscription_state,
        subscriber,
        publisher,
    })
}
