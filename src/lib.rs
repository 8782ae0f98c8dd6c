//! Appliance Provisioning Agent
//!
//! Host-side orchestration for joining Hub and Crate appliances onto Wi-Fi or
//! Thread networks over BLE:
//! - discovery and connection negotiation
//! - credential exchange with asynchronous status observation
//! - typed error recovery with retry-with-memory
//! - persistence of the outcome (network identity, never the secret)

pub mod config;
pub mod core;
pub mod protocol;
pub mod registry;
pub mod transport;

pub use self::core::{
    error::{ErrorKind, ProvisionError, ProvisioningFault, RegistryError, TransportError},
    machine::ProvisioningMachine,
    types::{
        ApplianceId, DeviceInfo, DiscoveredDevice, HardwareClass, NetworkIdentity, ProvisionResult,
        ProvisioningStatus, SessionMode, Step, ThreadDataset, WifiNetwork,
    },
};
