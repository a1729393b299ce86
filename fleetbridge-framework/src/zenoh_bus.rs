//! Zenoh-backed collaborators.
//!
//! # Key Expressions
//!
//! - Channel traffic: `<prefix>/<channel>`
//! - Directory queries: `<prefix>/@/directory/<service>`
//! - Node liveliness: `<prefix>/@/nodes/<service>/alive`
//!
//! Registration is a query on the directory key carrying a JSON
//! [`RegistrationRequest`]; the directory answers with a JSON
//! [`RegistrationReply`] naming the server to connect to. The node then holds
//! a liveliness token until it unregisters, so the directory sees it leave.
//!
//! # Router Loss
//!
//! A client session keeps retrying its router in the background, so `put`
//! keeps succeeding and subscribers stay open while the server is down. In
//! client mode a [`ZenohHandle`] therefore treats "no router connected" as a
//! failed connection: `notify` returns a publish error and the supply stream
//! ends with a stream error once the router is gone.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};
use zenoh::Session;
use zenoh::handlers::FifoChannelHandler;
use zenoh::liveliness::LivelinessToken;
use zenoh::pubsub::Subscriber;
use zenoh::sample::{Sample, SampleKind};

use fleetbridge_common::{Channel, KeyExprBuilder, ZenohConfig, connect, endpoint_for};

use crate::bus::{BusHandle, Connector, Directory, SupplyStream};
use crate::error::{BridgeError, Result};

/// Default wait for a directory reply.
pub const DEFAULT_REGISTRATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Default period of the router check on an idle supply stream.
pub const DEFAULT_ROUTER_CHECK: Duration = Duration::from_secs(1);

/// Opens Zenoh sessions to a bus server.
#[derive(Debug, Clone)]
pub struct ZenohConnector {
    base: ZenohConfig,
    router_check: Duration,
}

impl Default for ZenohConnector {
    fn default() -> Self {
        Self::new(ZenohConfig::default())
    }
}

impl ZenohConnector {
    /// `base` supplies the mode and any extra endpoints; the server address is added per connect.
    pub fn new(base: ZenohConfig) -> Self {
        Self {
            base,
            router_check: DEFAULT_ROUTER_CHECK,
        }
    }

    /// How often an idle supply stream checks that its router is still there.
    pub fn with_router_check(mut self, period: Duration) -> Self {
        self.router_check = period;
        self
    }
}

impl Connector for ZenohConnector {
    type Handle = ZenohHandle;

    async fn connect(&self, server_address: &str) -> Result<ZenohHandle> {
        let config = self.base.with_endpoint(endpoint_for(server_address));
        let session = connect(&config)
            .await
            .map_err(|e| BridgeError::connection(server_address, e))?;

        info!(server = %server_address, zid = %session.zid(), "Connected to bus server");

        // Peers and routers have no single server to lose
        let router_check = (self.base.mode == "client").then_some(self.router_check);

        Ok(ZenohHandle {
            session: Arc::new(session),
            router_check,
        })
    }
}

/// Shared Zenoh session. The session closes when the last clone is dropped.
#[derive(Clone)]
pub struct ZenohHandle {
    session: Arc<Session>,
    router_check: Option<Duration>,
}

impl ZenohHandle {
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Whether the session counts as connected.
    ///
    /// Always true outside client mode.
    pub async fn is_connected(&self) -> bool {
        self.router_check.is_none() || has_router(&self.session).await
    }
}

async fn has_router(session: &Session) -> bool {
    let info = session.info();
    let mut routers = info.routers_zid().await;
    routers.next().is_some()
}

/// Resolves once `session` has no router, checking every `period`.
async fn router_lost(session: &Session, period: Duration) {
    loop {
        tokio::time::sleep(period).await;
        if !has_router(session).await {
            return;
        }
    }
}

impl BusHandle for ZenohHandle {
    type Stream = ZenohSupplyStream;

    async fn subscribe(&self, key: &str) -> Result<ZenohSupplyStream> {
        if !self.is_connected().await {
            return Err(BridgeError::stream(key, "no router connected"));
        }

        let subscriber = self
            .session
            .declare_subscriber(key)
            .await
            .map_err(|e| BridgeError::stream(key, e))?;

        debug!(key = %key, "Subscriber declared");

        Ok(ZenohSupplyStream {
            key: key.to_string(),
            session: self.session.clone(),
            router_check: self.router_check,
            subscriber,
        })
    }

    async fn notify(&self, key: &str, payload: Vec<u8>) -> Result<()> {
        if !self.is_connected().await {
            return Err(BridgeError::publish(key, "no router connected"));
        }

        self.session
            .put(key, payload)
            .await
            .map_err(|e| BridgeError::publish(key, e))
    }
}

/// Samples from a Zenoh subscriber. Delete samples are skipped.
///
/// In client mode the stream fails when its router goes away.
pub struct ZenohSupplyStream {
    key: String,
    session: Arc<Session>,
    router_check: Option<Duration>,
    subscriber: Subscriber<FifoChannelHandler<Sample>>,
}

impl SupplyStream for ZenohSupplyStream {
    async fn next_supply(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            let received = match self.router_check {
                Some(period) => tokio::select! {
                    received = self.subscriber.recv_async() => received,
                    _ = router_lost(&self.session, period) => {
                        return Err(BridgeError::stream(&self.key, "router connection lost"));
                    }
                },
                None => self.subscriber.recv_async().await,
            };
            let sample = received.map_err(|e| BridgeError::stream(&self.key, e))?;

            if sample.kind() == SampleKind::Delete {
                trace!(key = %sample.key_expr(), "Ignoring delete sample");
                continue;
            }

            return Ok(Some(sample.payload().to_bytes().to_vec()));
        }
    }
}

/// Body of a directory registration query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRequest {
    pub service: String,
    pub channels: Vec<Channel>,
    pub version: String,
}

/// Directory answer to a [`RegistrationRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationReply {
    /// Server address (`host:port` or Zenoh locator) to connect to.
    pub server: String,
    /// Node id assigned by the directory, if it assigns one.
    #[serde(default)]
    pub node_id: Option<u64>,
}

struct Registration {
    session: Session,
    token: LivelinessToken,
}

/// Registers through a directory reachable over Zenoh.
pub struct ZenohDirectory {
    address: String,
    base: ZenohConfig,
    keys: KeyExprBuilder,
    timeout: Duration,
    registration: Mutex<Option<Registration>>,
}

impl ZenohDirectory {
    pub fn new(address: impl Into<String>, base: ZenohConfig, keys: KeyExprBuilder) -> Self {
        Self {
            address: address.into(),
            base,
            keys,
            timeout: DEFAULT_REGISTRATION_TIMEOUT,
            registration: Mutex::new(None),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    async fn query(
        &self,
        session: &Session,
        service: &str,
        channels: &[Channel],
    ) -> Result<RegistrationReply> {
        let key = self.keys.directory(service);
        let request = RegistrationRequest {
            service: service.to_string(),
            channels: channels.to_vec(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        };

        let replies = session
            .get(key.as_str())
            .payload(serde_json::to_vec(&request)?)
            .timeout(self.timeout)
            .await
            .map_err(|e| BridgeError::registration(format!("query on {} failed: {}", key, e)))?;

        while let Ok(reply) = replies.recv_async().await {
            match reply.result() {
                Ok(sample) => {
                    let payload = sample.payload().to_bytes();
                    match serde_json::from_slice::<RegistrationReply>(&payload) {
                        Ok(answer) => return Ok(answer),
                        Err(e) => warn!(key = %key, error = %e, "Ignoring malformed directory reply"),
                    }
                }
                Err(err) => warn!(key = %key, error = ?err, "Directory replied with an error"),
            }
        }

        Err(BridgeError::registration(format!(
            "no reply from directory {} within {:?}",
            self.address, self.timeout
        )))
    }
}

impl Directory for ZenohDirectory {
    async fn register(&self, service: &str, channels: &[Channel]) -> Result<String> {
        let config = self.base.with_endpoint(endpoint_for(&self.address));
        let session = connect(&config).await.map_err(|e| {
            BridgeError::registration(format!("cannot reach directory {}: {}", self.address, e))
        })?;

        let answer = match self.query(&session, service, channels).await {
            Ok(answer) => answer,
            Err(e) => {
                if let Err(close) = session.close().await {
                    debug!(error = %close, "Error closing directory session");
                }
                return Err(e);
            }
        };

        let alive = self.keys.node_alive(service);
        let token = session
            .liveliness()
            .declare_token(alive.as_str())
            .await
            .map_err(|e| BridgeError::registration(format!("liveliness token: {}", e)))?;

        info!(
            service = %service,
            server = %answer.server,
            node_id = ?answer.node_id,
            "Registered with directory"
        );

        *self.registration.lock().await = Some(Registration { session, token });
        Ok(answer.server)
    }

    async fn unregister(&self) {
        let Some(registration) = self.registration.lock().await.take() else {
            return;
        };

        drop(registration.token);
        if let Err(e) = registration.session.close().await {
            warn!(error = %e, "Error closing directory session");
        }
        info!(directory = %self.address, "Unregistered from directory");
    }
}

/// Directory stand-in for deployments without one: always answers `server`.
#[derive(Debug, Clone)]
pub struct StaticDirectory {
    server: String,
}

impl StaticDirectory {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
        }
    }
}

impl Directory for StaticDirectory {
    async fn register(&self, service: &str, _channels: &[Channel]) -> Result<String> {
        info!(service = %service, server = %self.server, "Using static server address");
        Ok(self.server.clone())
    }

    async fn unregister(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_request_json() {
        let request = RegistrationRequest {
            service: "PT2Fleet".to_string(),
            channels: vec![Channel::PtService, Channel::RideShare],
            version: "0.1.0".to_string(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["service"], "PT2Fleet");
        assert_eq!(json["channels"][0], "pt_service");
        assert_eq!(json["channels"][1], "ride_share");
    }

    #[test]
    fn test_registration_reply_without_node_id() {
        let reply: RegistrationReply =
            serde_json::from_str(r#"{"server": "127.0.0.1:10000"}"#).unwrap();
        assert_eq!(reply.server, "127.0.0.1:10000");
        assert_eq!(reply.node_id, None);
    }

    #[tokio::test]
    async fn test_static_directory() {
        let directory = StaticDirectory::new("10.0.0.1:7447");
        let server = directory.register("PT2Fleet", &[]).await.unwrap();
        assert_eq!(server, "10.0.0.1:7447");
        directory.unregister().await;
    }

    #[tokio::test]
    async fn test_unregister_without_registration() {
        let directory = ZenohDirectory::new(
            "127.0.0.1:9990",
            ZenohConfig::default(),
            KeyExprBuilder::default(),
        );
        directory.unregister().await;
        assert_eq!(directory.address(), "127.0.0.1:9990");
    }
}
