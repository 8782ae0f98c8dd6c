//! Core provisioning logic

pub mod attempt;
pub mod classifier;
pub mod error;
pub mod machine;
pub mod provisioner;
pub mod relay;
pub mod types;

pub use {
    attempt::ProvisioningAttempt,
    classifier::ErrorClassifier,
    machine::ProvisioningMachine,
    provisioner::{CredentialProvisioner, Credentials},
    relay::NetworkScanRelay,
};
