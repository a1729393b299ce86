use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default key expression prefix for all fleet bridge traffic.
pub const KEY_PREFIX: &str = "fleetbridge";

/// Bus channel (topic) identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Ride-share / fleet positions.
    RideShare,
    /// Advertisement service.
    AdService,
    /// Library service.
    LibService,
    /// Public-transit service positions.
    PtService,
    /// Route planning service.
    RouteService,
}

impl Channel {
    /// Get the string representation used in key expressions.
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::RideShare => "ride_share",
            Channel::AdService => "ad_service",
            Channel::LibService => "lib_service",
            Channel::PtService => "pt_service",
            Channel::RouteService => "route_service",
        }
    }

    /// Parse a channel from its key expression segment.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ride_share" => Some(Channel::RideShare),
            "ad_service" => Some(Channel::AdService),
            "lib_service" => Some(Channel::LibService),
            "pt_service" => Some(Channel::PtService),
            "route_service" => Some(Channel::RouteService),
            _ => None,
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Builder for fleet bridge key expressions.
///
/// Layout:
/// - `<prefix>/<channel>` - supplies on a channel
/// - `<prefix>/@/directory/<service>` - directory registration queries
/// - `<prefix>/@/nodes/<service>/alive` - node liveliness
/// - `<prefix>/@/status/<service>` - node status reports
#[derive(Debug, Clone)]
pub struct KeyExprBuilder {
    prefix: String,
}

impl Default for KeyExprBuilder {
    fn default() -> Self {
        Self::new(KEY_PREFIX)
    }
}

impl KeyExprBuilder {
    /// Create a builder with a custom prefix.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// The prefix this builder prepends.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Key expression for supplies on a channel.
    ///
    /// # Example
    /// ```
    /// use fleetbridge_common::keyexpr::{Channel, KeyExprBuilder};
    ///
    /// let key = KeyExprBuilder::default().channel(Channel::RideShare);
    /// assert_eq!(key, "fleetbridge/ride_share");
    /// ```
    pub fn channel(&self, channel: Channel) -> String {
        format!("{}/{}", self.prefix, channel.as_str())
    }

    /// Key expression queried to register a service with the directory.
    pub fn directory(&self, service: &str) -> String {
        format!("{}/@/directory/{}", self.prefix, service)
    }

    /// Liveliness token key for a registered node.
    pub fn node_alive(&self, service: &str) -> String {
        format!("{}/@/nodes/{}/alive", self.prefix, service)
    }

    /// Key expression node status is reported on.
    pub fn status(&self, service: &str) -> String {
        format!("{}/@/status/{}", self.prefix, service)
    }
}

/// Parse a supply key expression into its channel.
///
/// Expects `<prefix>/<channel>`; the prefix may itself contain `/`.
pub fn parse_channel_key(key: &str) -> Result<Channel> {
    let (_, last) = key
        .rsplit_once('/')
        .ok_or_else(|| Error::KeyExpr(format!("Missing channel segment: {}", key)))?;

    Channel::parse(last).ok_or_else(|| Error::KeyExpr(format!("Unknown channel: {}", last)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_roundtrip() {
        for channel in [
            Channel::RideShare,
            Channel::AdService,
            Channel::LibService,
            Channel::PtService,
            Channel::RouteService,
        ] {
            assert_eq!(Channel::parse(channel.as_str()), Some(channel));
        }
        assert_eq!(Channel::parse("bogus"), None);
    }

    #[test]
    fn test_admin_keys() {
        let keys = KeyExprBuilder::new("synerex");

        assert_eq!(keys.directory("PT2Fleet"), "synerex/@/directory/PT2Fleet");
        assert_eq!(keys.node_alive("PT2Fleet"), "synerex/@/nodes/PT2Fleet/alive");
        assert_eq!(keys.status("PT2Fleet"), "synerex/@/status/PT2Fleet");
    }

    #[test]
    fn test_parse_channel_key() {
        assert_eq!(
            parse_channel_key("a/b/pt_service").unwrap(),
            Channel::PtService
        );
        assert!(parse_channel_key("fleetbridge").is_err());
        assert!(parse_channel_key("fleetbridge/nope").is_err());
    }

    #[test]
    fn test_channel_serde_name() {
        let json = serde_json::to_string(&Channel::PtService).unwrap();
        assert_eq!(json, "\"pt_service\"");
    }
}
