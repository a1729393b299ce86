//! Fleet Bridge Common Library
//!
//! Shared types and utilities for the fleet telemetry bridges:
//!
//! - [`schema`] - Wire schemas (`PtService`, `Fleet`) and the `Supply` envelope
//! - [`serialization`] - JSON/CBOR encoding and decoding of envelopes
//! - [`config`] - Configuration loading (JSON5 format)
//! - [`session`] - Zenoh session management
//! - [`keyexpr`] - Channels and key expression builders
//! - [`error`] - Error types

pub mod config;
pub mod error;
pub mod keyexpr;
pub mod schema;
pub mod serialization;
pub mod session;

// Re-export commonly used types at the crate root
pub use config::{LogFormat, LoggingConfig, ZenohConfig, load_config, parse_config};
pub use error::{Error, Result};
pub use keyexpr::{Channel, KEY_PREFIX, KeyExprBuilder, parse_channel_key};
pub use schema::{Content, Fleet, FleetCoord, PtService, Supply, current_timestamp_millis};
pub use serialization::{Format, decode, decode_auto, encode};
pub use session::{connect, endpoint_for};

/// Initialize tracing with the given configuration.
///
/// Supports two output formats:
/// - `LogFormat::Text` (default): Human-readable text format
/// - `LogFormat::Json`: Structured JSON format for log aggregation systems
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
    }

    Ok(())
}
