//! Wire schemas carried by the bus.
//!
//! Two fixed protobuf messages travel inside a serde envelope:
//!
//! - [`PtService`] - public-transit position supplied on the inbound channel
//! - [`Fleet`] - fleet position published on the outbound channel
//!
//! The [`Supply`] envelope is serialized with a [`Format`](crate::Format);
//! its [`Content::entity`] holds the protobuf bytes untouched.

use std::time::{SystemTime, UNIX_EPOCH};

use prost::Message;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Public-transit vehicle position.
#[derive(Clone, PartialEq, Message)]
pub struct PtService {
    #[prost(string, tag = "1")]
    pub vehicle_id: String,
    #[prost(double, tag = "2")]
    pub lat: f64,
    #[prost(double, tag = "3")]
    pub lon: f64,
    #[prost(double, tag = "4")]
    pub angle: f64,
    #[prost(double, tag = "5")]
    pub speed: f64,
}

impl PtService {
    /// Decode from protobuf bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Ok(Self::decode(data)?)
    }
}

/// Fleet vehicle coordinates.
#[derive(Clone, Copy, PartialEq, Message)]
pub struct FleetCoord {
    #[prost(float, tag = "1")]
    pub lat: f32,
    #[prost(float, tag = "2")]
    pub lon: f32,
}

/// Fleet vehicle position.
#[derive(Clone, PartialEq, Message)]
pub struct Fleet {
    #[prost(string, tag = "1")]
    pub vehicle_id: String,
    #[prost(message, optional, tag = "2")]
    pub coord: Option<FleetCoord>,
    #[prost(float, tag = "3")]
    pub angle: f32,
    #[prost(int32, tag = "4")]
    pub speed: i32,
    #[prost(int32, tag = "5")]
    pub status: i32,
}

impl Fleet {
    /// Latitude, or 0.0 when no coordinates are set.
    pub fn lat(&self) -> f32 {
        self.coord.map(|c| c.lat).unwrap_or_default()
    }

    /// Longitude, or 0.0 when no coordinates are set.
    pub fn lon(&self) -> f32 {
        self.coord.map(|c| c.lon).unwrap_or_default()
    }

    /// Decode from protobuf bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Ok(Self::decode(data)?)
    }
}

/// Opaque schema-specific payload of a supply.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Content {
    /// Serialized protobuf message.
    #[serde(with = "serde_bytes")]
    pub entity: Vec<u8>,
}

impl Content {
    pub fn new(entity: Vec<u8>) -> Self {
        Self { entity }
    }

    /// Wrap an encoded protobuf message.
    pub fn from_message<M: Message>(message: &M) -> Self {
        Self::new(message.encode_to_vec())
    }
}

/// Envelope published on a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supply {
    /// Binding name of the publishing client (e.g., "PT2Fleet:Fleet").
    pub sender: String,

    /// Supply name (e.g., "Fleet Supply").
    pub name: String,

    /// Unix epoch milliseconds when the supply was built.
    pub timestamp: i64,

    /// Schema-specific payload.
    pub content: Content,
}

impl Supply {
    /// Create a new supply stamped with the current time.
    pub fn new(sender: impl Into<String>, name: impl Into<String>, content: Content) -> Self {
        Self {
            sender: sender.into(),
            name: name.into(),
            timestamp: current_timestamp_millis(),
            content,
        }
    }

    /// Decode the carried protobuf message.
    pub fn decode_entity<M: Message + Default>(&self) -> Result<M> {
        Ok(M::decode(self.content.entity.as_slice())?)
    }
}

/// Get the current timestamp in milliseconds since Unix epoch.
///
/// Returns 0 if system time is before Unix epoch.
pub fn current_timestamp_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_pt_service_protobuf_roundtrip() {
        let pt = PtService {
            vehicle_id: "bus-7".to_string(),
            lat: 34.702485,
            lon: 135.495951,
            angle: 270.5,
            speed: 32.25,
        };

        let decoded = PtService::from_bytes(&pt.encode_to_vec()).unwrap();
        assert_eq!(decoded, pt);
    }

    #[test]
    fn test_fleet_coord_accessors() {
        let mut fleet = Fleet {
            vehicle_id: "bus-7".to_string(),
            coord: Some(FleetCoord { lat: 35.0, lon: 135.0 }),
            ..Default::default()
        };
        assert_eq!(fleet.lat(), 35.0);
        assert_eq!(fleet.lon(), 135.0);

        fleet.coord = None;
        assert_eq!(fleet.lat(), 0.0);
        assert_eq!(fleet.lon(), 0.0);
    }

    #[test]
    fn test_supply_decode_entity() {
        let pt = PtService {
            vehicle_id: "tram-2".to_string(),
            speed: 12.0,
            ..Default::default()
        };
        let supply = Supply::new("PT", "PT Supply", Content::from_message(&pt));

        let decoded: PtService = supply.decode_entity().unwrap();
        assert_eq!(decoded.vehicle_id, "tram-2");
        assert_eq!(decoded.speed, 12.0);
    }

    #[test]
    fn test_truncated_entity_is_an_error() {
        let pt = PtService {
            vehicle_id: "a-rather-long-vehicle-identifier".to_string(),
            ..Default::default()
        };
        let mut bytes = pt.encode_to_vec();
        bytes.truncate(6);

        let result = PtService::from_bytes(&bytes);
        assert!(matches!(result, Err(Error::Protobuf(_))));
    }

    #[test]
    fn test_cbor_entity_is_a_byte_string() {
        use ciborium::Value;

        fn field<'a>(map: &'a Value, name: &str) -> &'a Value {
            map.as_map()
                .unwrap()
                .iter()
                .find(|(k, _)| k.as_text() == Some(name))
                .map(|(_, v)| v)
                .unwrap()
        }

        let content = Content::new(vec![0x0a, 0x02, 0x68, 0x69]);
        let supply = Supply::new("PT", "PT Supply", content.clone());
        let bytes = crate::encode(&supply, crate::Format::Cbor).unwrap();

        let value: Value = ciborium::from_reader(bytes.as_slice()).unwrap();
        let entity = field(field(&value, "content"), "entity");
        assert_eq!(entity, &Value::Bytes(content.entity.clone()));

        let decoded: Supply = crate::decode_auto(&bytes).unwrap();
        assert_eq!(decoded.content, content);
    }

    #[test]
    fn test_timestamp_is_set() {
        let supply = Supply::new("a", "b", Content::default());
        assert!(supply.timestamp > 0);
    }
}
