//! Fleet Bridge Framework
//!
//! Building blocks for bridges that move supplies between channels of a Zenoh bus.
//!
//! # Overview
//!
//! This framework provides:
//! - [`bus`] traits for the collaborators a bridge talks to (directory, connector, handles, status sink)
//! - [`ServiceClient`] holding a rebindable, generation-tagged connection
//! - [`ReconnectPolicy`] and [`Reconnector`] for fixed-interval reconnection
//! - [`LivenessCounter`] and [`ErrorCounters`] for throughput and per-kind errors
//! - [`StatusReporter`] for periodic status reporting
//! - [`BridgeRunner`] for managing bridge lifecycle (tasks, signal handling, shutdown)
//! - [`BridgeConfig`] trait for configuration loading and validation
//! - [`BridgeArgs`] for common CLI argument parsing
//! - [`zenoh_bus`] and [`memory`] collaborator implementations
//!
//! # Example
//!
//! ```ignore
//! use fleetbridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = BridgeArgs::parse();
//!     let config = MyBridgeConfig::load_or_default(args.config.as_deref())?;
//!
//!     let mut runner = BridgeRunner::new("mybridge");
//!     runner.spawn("worker", my_worker(runner.shutdown_signal()));
//!
//!     // Run until Ctrl+C
//!     runner.run().await?;
//!     Ok(())
//! }
//! ```

mod args;
pub mod bus;
mod client;
mod config;
mod error;
pub mod memory;
mod metrics;
mod reconnect;
mod runner;
mod shutdown;
mod status;
pub mod zenoh_bus;

pub use args::{BridgeArgs, DEFAULT_NODESRV};
pub use bus::{BindingDescriptor, BusHandle, Connector, Directory, StatusSink, SupplyStream};
pub use client::{Ack, ServiceClient};
pub use config::BridgeConfig;
pub use error::{BridgeError, ErrorKind, Result};
pub use metrics::{ErrorCounters, ErrorSnapshot, LivenessCounter};
pub use reconnect::{DEFAULT_RECONNECT_INTERVAL, ReconnectPolicy, Reconnector};
pub use runner::{BridgeRunner, DEFAULT_SHUTDOWN_GRACE};
pub use shutdown::{ShutdownSignal, ShutdownTrigger, shutdown_channel, wait_for_os_signal};
pub use status::{
    BusStatusSink, DEFAULT_STATUS_INTERVAL, DEFAULT_STATUS_LABEL, NodeState, NodeStatus,
    StatusReporter,
};

// Re-export commonly used types from fleetbridge-common
pub use fleetbridge_common::{Channel, Format, KeyExprBuilder, LoggingConfig, ZenohConfig};
