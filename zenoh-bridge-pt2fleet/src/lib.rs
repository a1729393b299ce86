//! Zenoh bridge from public-transit positions to fleet positions.
//!
//! Subscribes to `PtService` supplies on the inbound channel, converts each
//! one to the `Fleet` schema and republishes it on the outbound channel.
//!
//! # Key Expressions
//!
//! ```text
//! fleetbridge/pt_service                 inbound supplies
//! fleetbridge/ride_share                 outbound supplies
//! fleetbridge/@/status/<service>         JSON node status
//! fleetbridge/@/directory/<service>      directory registration (query)
//! fleetbridge/@/nodes/<service>/alive    liveliness while registered
//! ```

pub mod bridge;
pub mod config;
pub mod publisher;
pub mod subscription;
pub mod translator;

pub use bridge::{BridgeHandles, start};
pub use config::{BridgeSettings, DirectoryConfig, DirectoryMode, Pt2FleetConfig};
pub use publisher::OutboundPublisher;
pub use subscription::{InboundSubscription, SubscriptionState};
pub use translator::{DecodeError, to_fleet, translate};
