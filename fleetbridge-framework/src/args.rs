//! CLI argument parsing for bridges.

use std::path::PathBuf;

use clap::Parser;

use crate::LoggingConfig;

/// Default node directory server address.
pub const DEFAULT_NODESRV: &str = "127.0.0.1:9990";

/// Common CLI arguments for all bridges.
#[derive(Parser, Debug, Clone, Default)]
#[command(about = "Fleet telemetry bridge")]
pub struct BridgeArgs {
    /// Node directory server address [default: 127.0.0.1:9990].
    #[arg(long, value_name = "HOST:PORT")]
    pub nodesrv: Option<String>,

    /// Path to configuration file (JSON5). Defaults apply when omitted.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,
}

impl BridgeArgs {
    /// Parse CLI arguments from the process environment.
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    /// Directory address: `--nodesrv` if given, else `configured`.
    pub fn nodesrv_or<'a>(&'a self, configured: &'a str) -> &'a str {
        self.nodesrv.as_deref().unwrap_or(configured)
    }

    /// Apply `--log-level` on top of the configured logging.
    pub fn logging(&self, configured: &LoggingConfig) -> LoggingConfig {
        let mut logging = configured.clone();
        if let Some(ref level) = self.log_level {
            logging.level = level.clone();
        }
        logging
    }
}
