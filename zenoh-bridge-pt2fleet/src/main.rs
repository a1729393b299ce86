//! Zenoh bridge from public-transit positions to fleet positions.

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use fleetbridge_common::init_tracing;
use fleetbridge_framework::zenoh_bus::{StaticDirectory, ZenohConnector, ZenohDirectory};
use fleetbridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner, Directory, wait_for_os_signal};

use zenoh_bridge_pt2fleet::{DirectoryMode, Pt2FleetConfig, bridge};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = BridgeArgs::parse();

    // Load configuration; every field has a default
    let config = Pt2FleetConfig::load_or_default(args.config.as_deref())
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    init_tracing(&args.logging(&config.logging))?;

    info!(
        bridge = %config.bridge.service_name,
        version = env!("CARGO_PKG_VERSION"),
        "Starting PT2Fleet provider"
    );

    match config.directory.mode {
        DirectoryMode::Zenoh => {
            let address = args.nodesrv_or(&config.directory.address);
            let directory =
                ZenohDirectory::new(address, config.zenoh.clone(), config.bridge.keys())
                    .with_timeout(config.directory.timeout());
            serve(&config, directory).await
        }
        DirectoryMode::Static => {
            let server = config.directory.server.clone().unwrap_or_default();
            serve(&config, StaticDirectory::new(server)).await
        }
    }
}

async fn serve<D: Directory>(config: &Pt2FleetConfig, directory: D) -> Result<()> {
    let mut runner = BridgeRunner::new(&config.bridge.service_name)
        .with_version(env!("CARGO_PKG_VERSION"));
    let connector = Arc::new(ZenohConnector::new(config.zenoh.clone()));

    let started = tokio::select! {
        result = bridge::start(&mut runner, &config.bridge, connector, &directory) => Some(result),
        _ = wait_for_os_signal() => None,
    };

    match started {
        Some(Ok(handles)) => {
            info!(server = %handles.server, "PT2Fleet provider running");
            runner.run().await.map_err(|e| anyhow::anyhow!("{}", e))?;
            info!(
                forwarded = handles.counter.snapshot(),
                errors = ?handles.errors.snapshot(),
                "PT2Fleet provider stopped"
            );
        }
        Some(Err(e)) => {
            runner.stop().await;
            directory.unregister().await;
            return Err(anyhow::anyhow!("Can't start PT2Fleet provider: {}", e));
        }
        None => {
            info!("Interrupted during startup");
            runner.stop().await;
        }
    }

    directory.unregister().await;
    Ok(())
}
