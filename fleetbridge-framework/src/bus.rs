//! Collaborator traits the bridge pipeline talks to.
//!
//! A bus implementation provides a [`Connector`] that opens connections
//! (handles) to a server, a [`BusHandle`] able to open supply streams and
//! notify supplies, and a [`SupplyStream`]. Registration goes through a
//! [`Directory`], status reports through a [`StatusSink`].
//!
//! See [`crate::zenoh_bus`] for the Zenoh implementation and
//! [`crate::memory`] for an in-process one.

use std::future::Future;

use serde::{Deserialize, Serialize};

use fleetbridge_common::Channel;

use crate::error::Result;
use crate::status::NodeStatus;

/// Identifies a client's role to the bus, e.g. `PT2Fleet:Fleet`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BindingDescriptor {
    /// Node (service) name.
    pub node: String,
    /// Role of this client within the node.
    pub role: String,
}

impl BindingDescriptor {
    pub fn new(node: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            role: role.into(),
        }
    }

    /// Name stamped as the sender of outgoing supplies.
    pub fn name(&self) -> String {
        format!("{}:{}", self.node, self.role)
    }
}

impl std::fmt::Display for BindingDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.node, self.role)
    }
}

/// Long-lived stream of supply payloads on one key.
pub trait SupplyStream: Send + 'static {
    /// Wait for the next payload.
    ///
    /// `Ok(None)` means the stream was closed by the remote side.
    fn next_supply(&mut self) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;
}

/// An open connection to a bus server.
///
/// Handles are cheap to clone; clones share the underlying connection.
pub trait BusHandle: Clone + Send + Sync + 'static {
    type Stream: SupplyStream;

    /// Open a supply stream on `key`.
    fn subscribe(&self, key: &str) -> impl Future<Output = Result<Self::Stream>> + Send;

    /// Publish one payload on `key`.
    fn notify(&self, key: &str, payload: Vec<u8>) -> impl Future<Output = Result<()>> + Send;
}

/// Opens connections to a bus server.
pub trait Connector: Send + Sync + 'static {
    type Handle: BusHandle;

    /// Attempt a single connection to `server_address`.
    fn connect(&self, server_address: &str) -> impl Future<Output = Result<Self::Handle>> + Send;
}

/// Node directory: hands back the server address to connect to.
pub trait Directory: Send + Sync {
    /// Register `service` as using `channels` and return the server address.
    fn register(
        &self,
        service: &str,
        channels: &[Channel],
    ) -> impl Future<Output = Result<String>> + Send;

    /// Withdraw the registration. Best effort.
    fn unregister(&self) -> impl Future<Output = ()> + Send;
}

/// External monitoring sink for node status.
pub trait StatusSink: Send + Sync + 'static {
    fn set_status(&self, status: &NodeStatus) -> impl Future<Output = Result<()>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_name() {
        let binding = BindingDescriptor::new("PT2Fleet", "Fleet");
        assert_eq!(binding.name(), "PT2Fleet:Fleet");
        assert_eq!(binding.to_string(), "PT2Fleet:Fleet");
    }
}
