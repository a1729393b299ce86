//! In-process bus.
//!
//! [`MemoryBus`] implements [`Connector`]: every successful connect hands out
//! a new [`MemoryHandle`] with its own connection id. Supplies notified on a
//! key are recorded and delivered to every open stream on that key.
//!
//! Faults can be injected to exercise reconnect paths:
//! - [`MemoryBus::refuse_connections`] - next N connects fail
//! - [`MemoryBus::fail_notifies`] - next N notifies on a key fail
//! - [`MemoryBus::sever_subscriptions`] - close every stream on a key
//! - [`MemoryBus::kill_connections`] - every live connection dies

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;

use fleetbridge_common::Channel;

use crate::bus::{BusHandle, Connector, Directory, SupplyStream};
use crate::error::{BridgeError, Result};

#[derive(Debug)]
struct Subscription {
    connection: u64,
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

#[derive(Debug, Default)]
struct BusState {
    next_connection: u64,
    live: HashSet<u64>,
    refuse_connections: usize,
    fail_notifies: HashMap<String, usize>,
    subscriptions: HashMap<String, Vec<Subscription>>,
    published: HashMap<String, Vec<Vec<u8>>>,
    connect_attempts: u64,
}

/// Shared in-process bus. Clones refer to the same bus.
#[derive(Debug, Clone, Default)]
pub struct MemoryBus {
    state: Arc<Mutex<BusState>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` connection attempts fail.
    pub fn refuse_connections(&self, count: usize) {
        self.state.lock().refuse_connections = count;
    }

    /// Make the next `count` notifies on `key` fail.
    pub fn fail_notifies(&self, key: &str, count: usize) {
        self.state
            .lock()
            .fail_notifies
            .insert(key.to_string(), count);
    }

    /// Close every open stream on `key`. Returns how many were closed.
    pub fn sever_subscriptions(&self, key: &str) -> usize {
        self.state
            .lock()
            .subscriptions
            .remove(key)
            .map(|subs| subs.len())
            .unwrap_or(0)
    }

    /// Drop every live connection: their streams close and notifies fail.
    pub fn kill_connections(&self) {
        let mut state = self.state.lock();
        state.live.clear();
        state.subscriptions.clear();
    }

    /// Deliver a payload to every open stream on `key`, as a remote publisher would.
    ///
    /// Returns the number of streams it reached.
    pub fn inject(&self, key: &str, payload: Vec<u8>) -> usize {
        let mut state = self.state.lock();
        Self::deliver(&mut state, key, payload)
    }

    /// Everything successfully notified on `key`, in order.
    pub fn published(&self, key: &str) -> Vec<Vec<u8>> {
        self.state
            .lock()
            .published
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of open streams on `key`.
    pub fn subscriber_count(&self, key: &str) -> usize {
        self.state
            .lock()
            .subscriptions
            .get(key)
            .map(|subs| subs.iter().filter(|s| !s.tx.is_closed()).count())
            .unwrap_or(0)
    }

    /// Connections handed out so far.
    pub fn connections(&self) -> u64 {
        self.state.lock().next_connection
    }

    /// Connection attempts so far, refused ones included.
    pub fn connect_attempts(&self) -> u64 {
        self.state.lock().connect_attempts
    }

    fn deliver(state: &mut BusState, key: &str, payload: Vec<u8>) -> usize {
        let live = &state.live;
        let Some(subs) = state.subscriptions.get_mut(key) else {
            return 0;
        };
        subs.retain(|s| live.contains(&s.connection) && !s.tx.is_closed());
        subs.iter()
            .filter(|s| s.tx.send(payload.clone()).is_ok())
            .count()
    }
}

impl Connector for MemoryBus {
    type Handle = MemoryHandle;

    async fn connect(&self, server_address: &str) -> Result<MemoryHandle> {
        let mut state = self.state.lock();
        state.connect_attempts += 1;

        if state.refuse_connections > 0 {
            state.refuse_connections -= 1;
            return Err(BridgeError::connection(
                server_address,
                "connection refused",
            ));
        }

        state.next_connection += 1;
        let id = state.next_connection;
        state.live.insert(id);

        Ok(MemoryHandle {
            bus: self.clone(),
            id,
        })
    }
}

/// One connection to a [`MemoryBus`].
#[derive(Debug, Clone)]
pub struct MemoryHandle {
    bus: MemoryBus,
    id: u64,
}

impl MemoryHandle {
    /// Connection id, unique per successful connect.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether the connection is still alive.
    pub fn is_live(&self) -> bool {
        self.bus.state.lock().live.contains(&self.id)
    }
}

impl BusHandle for MemoryHandle {
    type Stream = MemoryStream;

    async fn subscribe(&self, key: &str) -> Result<MemoryStream> {
        let mut state = self.bus.state.lock();
        if !state.live.contains(&self.id) {
            return Err(BridgeError::stream(key, "connection closed"));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        state
            .subscriptions
            .entry(key.to_string())
            .or_default()
            .push(Subscription {
                connection: self.id,
                tx,
            });

        Ok(MemoryStream { rx })
    }

    async fn notify(&self, key: &str, payload: Vec<u8>) -> Result<()> {
        let mut state = self.bus.state.lock();
        if !state.live.contains(&self.id) {
            return Err(BridgeError::publish(key, "connection closed"));
        }

        if let Some(remaining) = state.fail_notifies.get_mut(key) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(BridgeError::publish(key, "injected failure"));
            }
        }

        state
            .published
            .entry(key.to_string())
            .or_default()
            .push(payload.clone());
        MemoryBus::deliver(&mut state, key, payload);
        Ok(())
    }
}

/// Stream half of a [`MemoryHandle::subscribe`].
#[derive(Debug)]
pub struct MemoryStream {
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl SupplyStream for MemoryStream {
    async fn next_supply(&mut self) -> Result<Option<Vec<u8>>> {
        Ok(self.rx.recv().await)
    }
}

/// Directory that answers with a fixed server address and records registrations.
#[derive(Debug)]
pub struct MemoryDirectory {
    server: Option<String>,
    registrations: Mutex<Vec<(String, Vec<Channel>)>>,
    unregistered: AtomicBool,
}

impl MemoryDirectory {
    /// Directory that always answers with `server`.
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: Some(server.into()),
            registrations: Mutex::new(Vec::new()),
            unregistered: AtomicBool::new(false),
        }
    }

    /// Directory that rejects every registration.
    pub fn unreachable() -> Self {
        Self {
            server: None,
            registrations: Mutex::new(Vec::new()),
            unregistered: AtomicBool::new(false),
        }
    }

    /// Registrations received so far.
    pub fn registrations(&self) -> Vec<(String, Vec<Channel>)> {
        self.registrations.lock().clone()
    }

    pub fn is_unregistered(&self) -> bool {
        self.unregistered.load(Ordering::SeqCst)
    }
}

impl Directory for MemoryDirectory {
    async fn register(&self, service: &str, channels: &[Channel]) -> Result<String> {
        let server = self
            .server
            .clone()
            .ok_or_else(|| BridgeError::registration("directory unreachable"))?;

        self.registrations
            .lock()
            .push((service.to_string(), channels.to_vec()));
        self.unregistered.store(false, Ordering::SeqCst);
        Ok(server)
    }

    async fn unregister(&self) {
        self.unregistered.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_assigns_ids() {
        let bus = MemoryBus::new();
        let a = bus.connect("mem").await.unwrap();
        let b = bus.connect("mem").await.unwrap();

        assert_eq!(a.id(), 1);
        assert_eq!(b.id(), 2);
        assert_eq!(bus.connections(), 2);
    }

    #[tokio::test]
    async fn test_refused_connections() {
        let bus = MemoryBus::new();
        bus.refuse_connections(2);

        assert!(bus.connect("mem").await.is_err());
        assert!(bus.connect("mem").await.is_err());
        assert!(bus.connect("mem").await.is_ok());
        assert_eq!(bus.connect_attempts(), 3);
        assert_eq!(bus.connections(), 1);
    }

    #[tokio::test]
    async fn test_notify_delivers_to_streams() {
        let bus = MemoryBus::new();
        let handle = bus.connect("mem").await.unwrap();
        let mut stream = handle.subscribe("a/b").await.unwrap();

        handle.notify("a/b", vec![1, 2, 3]).await.unwrap();

        assert_eq!(stream.next_supply().await.unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(bus.published("a/b"), vec![vec![1, 2, 3]]);
        assert!(bus.published("other").is_empty());
    }

    #[tokio::test]
    async fn test_injected_notify_failures_are_per_key() {
        let bus = MemoryBus::new();
        let handle = bus.connect("mem").await.unwrap();
        bus.fail_notifies("a", 1);

        assert!(handle.notify("b", vec![0]).await.is_ok());
        assert!(matches!(
            handle.notify("a", vec![1]).await,
            Err(BridgeError::Publish { .. })
        ));
        assert!(handle.notify("a", vec![2]).await.is_ok());
        assert_eq!(bus.published("a"), vec![vec![2]]);
    }

    #[tokio::test]
    async fn test_sever_closes_stream() {
        let bus = MemoryBus::new();
        let handle = bus.connect("mem").await.unwrap();
        let mut stream = handle.subscribe("k").await.unwrap();
        assert_eq!(bus.subscriber_count("k"), 1);

        assert_eq!(bus.sever_subscriptions("k"), 1);
        assert_eq!(stream.next_supply().await.unwrap(), None);
        assert_eq!(bus.subscriber_count("k"), 0);
    }

    #[tokio::test]
    async fn test_killed_connection_rejects_calls() {
        let bus = MemoryBus::new();
        let handle = bus.connect("mem").await.unwrap();
        bus.kill_connections();

        assert!(!handle.is_live());
        assert!(handle.notify("k", vec![]).await.is_err());
        assert!(handle.subscribe("k").await.is_err());

        let fresh = bus.connect("mem").await.unwrap();
        assert!(fresh.notify("k", vec![]).await.is_ok());
    }

    #[tokio::test]
    async fn test_directory_records_registrations() {
        let directory = MemoryDirectory::new("mem:1");
        let server = directory
            .register("PT2Fleet", &[Channel::PtService, Channel::RideShare])
            .await
            .unwrap();

        assert_eq!(server, "mem:1");
        assert_eq!(
            directory.registrations(),
            vec![(
                "PT2Fleet".to_string(),
                vec![Channel::PtService, Channel::RideShare]
            )]
        );

        directory.unregister().await;
        assert!(directory.is_unregistered());
    }

    #[tokio::test]
    async fn test_unreachable_directory() {
        let directory = MemoryDirectory::unreachable();
        let result = directory.register("PT2Fleet", &[]).await;
        assert!(matches!(result, Err(BridgeError::Registration(_))));
    }
}
