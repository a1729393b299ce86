//! PT2Fleet bridge configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use fleetbridge_framework::{
    BindingDescriptor, BridgeConfig, BridgeError, Channel, DEFAULT_NODESRV, DEFAULT_STATUS_LABEL,
    Format, KeyExprBuilder, LoggingConfig, Result, ZenohConfig,
};

/// Complete bridge configuration. Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pt2FleetConfig {
    /// Zenoh connection settings (mode, extra endpoints).
    #[serde(default)]
    pub zenoh: ZenohConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// How the server address is obtained.
    #[serde(default)]
    pub directory: DirectoryConfig,

    /// Bridge settings.
    #[serde(default)]
    pub bridge: BridgeSettings,
}

/// Where the server address comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectoryMode {
    /// Ask the node directory over Zenoh.
    #[default]
    Zenoh,
    /// Use `directory.server` as is.
    Static,
}

/// Node directory settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    #[serde(default)]
    pub mode: DirectoryMode,

    /// Directory address (`--nodesrv` overrides it).
    #[serde(default = "default_directory_address")]
    pub address: String,

    /// Server address for `static` mode.
    #[serde(default)]
    pub server: Option<String>,

    /// Registration reply timeout in milliseconds (default: 5000).
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_directory_address() -> String {
    DEFAULT_NODESRV.to_string()
}

fn default_timeout_ms() -> u64 {
    5000
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            mode: DirectoryMode::default(),
            address: default_directory_address(),
            server: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl DirectoryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Translation pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeSettings {
    /// Node name registered with the directory (default: "PT2Fleet").
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Key expression prefix (default: "fleetbridge").
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Channel supplies are read from (default: "pt_service").
    #[serde(default = "default_inbound_channel")]
    pub inbound_channel: Channel,

    /// Channel fleet supplies are written to (default: "ride_share").
    #[serde(default = "default_outbound_channel")]
    pub outbound_channel: Channel,

    /// Role of the subscribing client (default: "PTransit").
    #[serde(default = "default_inbound_binding")]
    pub inbound_binding: String,

    /// Role of the publishing client (default: "Fleet").
    #[serde(default = "default_outbound_binding")]
    pub outbound_binding: String,

    /// Name stamped on outgoing supplies (default: "Fleet Supply").
    #[serde(default = "default_supply_name")]
    pub supply_name: String,

    /// Envelope format of outgoing supplies (default: cbor).
    #[serde(default)]
    pub serialization: Format,

    /// Wait between reconnection attempts in milliseconds (default: 5000).
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,

    /// Status report interval in milliseconds (default: 3000).
    #[serde(default = "default_status_interval_ms")]
    pub status_interval_ms: u64,

    /// Label the forwarded count is reported under (default: "<-count").
    #[serde(default = "default_status_label")]
    pub status_label: String,
}

fn default_service_name() -> String {
    "PT2Fleet".to_string()
}

fn default_key_prefix() -> String {
    fleetbridge_common::KEY_PREFIX.to_string()
}

fn default_inbound_channel() -> Channel {
    Channel::PtService
}

fn default_outbound_channel() -> Channel {
    Channel::RideShare
}

fn default_inbound_binding() -> String {
    "PTransit".to_string()
}

fn default_outbound_binding() -> String {
    "Fleet".to_string()
}

fn default_supply_name() -> String {
    "Fleet Supply".to_string()
}

fn default_reconnect_interval_ms() -> u64 {
    5000
}

fn default_status_interval_ms() -> u64 {
    3000
}

fn default_status_label() -> String {
    DEFAULT_STATUS_LABEL.to_string()
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            key_prefix: default_key_prefix(),
            inbound_channel: default_inbound_channel(),
            outbound_channel: default_outbound_channel(),
            inbound_binding: default_inbound_binding(),
            outbound_binding: default_outbound_binding(),
            supply_name: default_supply_name(),
            serialization: Format::default(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
            status_interval_ms: default_status_interval_ms(),
            status_label: default_status_label(),
        }
    }
}

impl BridgeSettings {
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_millis(self.status_interval_ms)
    }

    pub fn keys(&self) -> KeyExprBuilder {
        KeyExprBuilder::new(&self.key_prefix)
    }

    /// Binding of the subscribing client, e.g. `PT2Fleet:PTransit`.
    pub fn inbound_binding(&self) -> BindingDescriptor {
        BindingDescriptor::new(&self.service_name, &self.inbound_binding)
    }

    /// Binding of the publishing client, e.g. `PT2Fleet:Fleet`.
    pub fn outbound_binding(&self) -> BindingDescriptor {
        BindingDescriptor::new(&self.service_name, &self.outbound_binding)
    }

    fn validate(&self) -> Result<()> {
        if self.service_name.trim().is_empty() {
            return Err(BridgeError::validation("bridge.service_name must not be empty"));
        }
        if self.key_prefix.is_empty() || self.key_prefix.contains(['*', '$', '?', '#']) {
            return Err(BridgeError::validation(format!(
                "bridge.key_prefix '{}' is not a plain key expression",
                self.key_prefix
            )));
        }
        if self.inbound_channel == self.outbound_channel {
            return Err(BridgeError::validation(format!(
                "inbound and outbound channel are both '{}'",
                self.inbound_channel
            )));
        }
        if self.reconnect_interval_ms == 0 {
            return Err(BridgeError::validation("reconnect_interval_ms must be > 0"));
        }
        if self.status_interval_ms == 0 {
            return Err(BridgeError::validation("status_interval_ms must be > 0"));
        }
        Ok(())
    }
}

impl BridgeConfig for Pt2FleetConfig {
    fn zenoh(&self) -> &ZenohConfig {
        &self.zenoh
    }

    fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    fn key_prefix(&self) -> &str {
        &self.bridge.key_prefix
    }

    fn validate(&self) -> Result<()> {
        self.bridge.validate()?;

        if self.directory.timeout_ms == 0 {
            return Err(BridgeError::validation("directory.timeout_ms must be > 0"));
        }
        if self.directory.mode == DirectoryMode::Static
            && self.directory.server.as_deref().is_none_or(str::is_empty)
        {
            return Err(BridgeError::validation(
                "directory.server is required in static mode",
            ));
        }
        Ok(())
    }
}
