//! Appliance Provisioning Agent - Main Entry Point

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use appliance_provisioner::{
    ApplianceId, HardwareClass, ProvisionError, ProvisioningMachine, SessionMode, Step,
    config::{CliArgs, Settings},
    registry::InMemoryRegistry,
    transport::ble::BleTransport,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,appliance_provisioner=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse CLI arguments
    let args = CliArgs::parse();
    info!(?args, "Starting appliance provisioner");

    // Validate configuration
    if args.ssid.is_none() && args.thread_peer.is_none() && !args.list_networks {
        error!("Provide --ssid/--password for a Hub or --thread-peer for a Crate");
        return Err("No credentials provided".into());
    }
    if args.ssid.is_some() && args.password.is_none() {
        error!("--ssid requires --password");
        return Err("No password provided".into());
    }

    let settings = Settings::from(&args);
    let transport = Arc::new(BleTransport::new().await?);
    let registry = Arc::new(InMemoryRegistry::new());

    let mode = match &args.reprovision {
        Some(appliance) => SessionMode::Reprovision {
            appliance: ApplianceId(appliance.clone()),
        },
        None => SessionMode::Initial,
    };
    let machine = Arc::new(ProvisioningMachine::with_mode(
        transport, registry, settings, mode,
    ));

    tokio::select! {
        result = run(machine.clone(), &args) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT (Ctrl+C), tearing down");
            if let Err(e) = machine.cancel().await {
                warn!("Teardown reported: {e}");
            }
            Ok(())
        }
    }
}

async fn run(
    machine: Arc<ProvisioningMachine<BleTransport, InMemoryRegistry>>,
    args: &CliArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    match machine.start().await {
        Ok(()) => {}
        Err(ProvisionError::AvailabilityDenied) => {
            error!("Bluetooth is disabled; enable it and run again");
            return Err("Bluetooth unavailable".into());
        }
        Err(e) => return Err(e.into()),
    }

    info!("Scanning for {}s...", args.scan_seconds);
    tokio::time::sleep(std::time::Duration::from_secs(args.scan_seconds)).await;

    let attempt = machine.attempt().await;
    let candidate = attempt
        .candidates()
        .iter()
        .filter(|c| match &args.device {
            Some(filter) => c.name.contains(filter.as_str()) || c.identity.contains(filter.as_str()),
            None => true,
        })
        .max_by_key(|c| c.rssi.unwrap_or(i16::MIN))
        .cloned();

    let Some(candidate) = candidate else {
        error!("No matching appliance found; is it in setup mode?");
        machine.reset().await?;
        return Err("No appliance found".into());
    };
    info!(
        "Selecting '{}' ({}) rssi={:?}",
        candidate.name, candidate.identity, candidate.rssi
    );

    machine.select_device(&candidate.identity).await?;
    if bail_on_fault(&machine, "connection").await? {
        return Err("Connection failed".into());
    }

    let info = machine
        .attempt()
        .await
        .device_info()
        .cloned()
        .ok_or("Device info missing after connect")?;

    if let Some(name) = &args.name {
        machine.set_custom_device_name(name).await?;
    }

    match info.class {
        HardwareClass::Hub => {
            if args.list_networks {
                machine.request_wifi_scan().await?;
                let attempt = machine.attempt().await;
                for network in attempt.networks().unwrap_or_default() {
                    info!(
                        "  {} ({}) rssi={}",
                        network.ssid,
                        if network.secured { "secured" } else { "open" },
                        network.rssi
                    );
                }
            }
            let Some(ssid) = &args.ssid else {
                info!("No credentials given; network listing done");
                machine.reset().await?;
                return Ok(());
            };
            let password = args.password.as_deref().unwrap_or_default();
            machine.provision_wifi(ssid, password).await?;
        }
        HardwareClass::Crate => {
            let Some(peer) = &args.thread_peer else {
                error!("Appliance is a Thread follower; provide --thread-peer");
                machine.reset().await?;
                return Err("Missing Thread peer".into());
            };
            machine
                .provision_thread(&ApplianceId(peer.clone()))
                .await?;
        }
    }

    if bail_on_fault(&machine, "provisioning").await? {
        return Err("Provisioning failed".into());
    }

    let appliance = machine.persist(&args.user).await?;
    let result = machine.result().await?;
    info!(
        "Appliance {appliance} provisioned: {}",
        serde_json::to_string_pretty(&result)?
    );
    Ok(())
}

/// Report a classified fault, if the machine is in the error state
async fn bail_on_fault(
    machine: &ProvisioningMachine<BleTransport, InMemoryRegistry>,
    phase: &str,
) -> Result<bool, Box<dyn std::error::Error>> {
    let attempt = machine.attempt().await;
    if attempt.step() != Step::Error {
        return Ok(false);
    }
    if let Some(fault) = attempt.fault() {
        error!("{phase} failed [{}]: {}", fault.kind, fault.message);
    }
    Ok(true)
}
