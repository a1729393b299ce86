//! PtService to Fleet conversion.
//!
//! Conversion is total: every decodable `PtService` maps to a `Fleet`.
//! Coordinates and angle narrow to `f32`, speed is truncated toward zero into
//! an `i32` (saturating at the bounds, NaN becomes 0) and status is always 0.
//! No range validation is applied.

use thiserror::Error;

use fleetbridge_common::{Content, Fleet, FleetCoord, Format, PtService, Supply, decode_auto, encode};
use fleetbridge_framework::BridgeError;

/// An inbound payload that could not be turned into a [`PtService`].
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid supply envelope: {0}")]
    Envelope(#[source] fleetbridge_common::Error),

    #[error("invalid PtService entity: {0}")]
    Entity(#[source] fleetbridge_common::Error),
}

impl From<DecodeError> for BridgeError {
    fn from(err: DecodeError) -> Self {
        BridgeError::Decode(err.to_string())
    }
}

/// Decode an inbound supply envelope and the `PtService` it carries.
pub fn decode_supply(payload: &[u8]) -> Result<(Supply, PtService), DecodeError> {
    let supply: Supply = decode_auto(payload).map_err(DecodeError::Envelope)?;
    let pt = supply
        .decode_entity::<PtService>()
        .map_err(DecodeError::Entity)?;
    Ok((supply, pt))
}

/// Convert a transit position to a fleet position.
pub fn to_fleet(pt: &PtService) -> Fleet {
    Fleet {
        vehicle_id: pt.vehicle_id.clone(),
        coord: Some(FleetCoord {
            lat: pt.lat as f32,
            lon: pt.lon as f32,
        }),
        angle: pt.angle as f32,
        speed: pt.speed as i32,
        status: 0,
    }
}

/// Decode an inbound payload and convert it.
pub fn translate(payload: &[u8]) -> Result<Fleet, DecodeError> {
    let (_, pt) = decode_supply(payload)?;
    Ok(to_fleet(&pt))
}

/// Wrap a fleet position in a supply envelope and serialize it.
pub fn encode_supply(
    fleet: &Fleet,
    sender: &str,
    name: &str,
    format: Format,
) -> Result<Vec<u8>, BridgeError> {
    let supply = Supply::new(sender, name, Content::from_message(fleet));
    encode(&supply, format).map_err(|e| BridgeError::Encode(e.to_string()))
}
