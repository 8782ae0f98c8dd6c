//! Device registry boundary
//!
//! The provisioning core consumes the registry through this narrow contract
//! and never stores network secrets in it; only the network identity and the
//! opaque consumer output cross the boundary.

pub mod memory;

use serde::{Deserialize, Serialize};
use trait_variant::make;

use crate::core::error::RegistryResult;
use crate::core::types::{ApplianceId, ProvisionResult, ThreadDataset};

/// A claimed appliance in the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplianceRecord {
    pub id: ApplianceId,
    pub serial: String,
    pub name: Option<String>,
}

/// Persistence collaborator contract
#[make(Send)]
pub trait DeviceRegistry: Send + Sync + 'static {
    /// Claim an appliance by serial, linking it to the current account
    async fn claim_appliance(&self, serial: &str) -> RegistryResult<ApplianceRecord>;

    /// Store the provisioning outcome against an appliance record
    async fn update_provisioning(
        &self,
        appliance: &ApplianceId,
        user: &str,
        name: &str,
        result: &ProvisionResult,
    ) -> RegistryResult<()>;

    /// Fetch the Thread dataset held by a peer Hub
    ///
    /// Returns `Ok(None)` when the peer holds no dataset; an unreachable peer
    /// is [`crate::core::error::RegistryError::PeerOffline`].
    async fn thread_dataset(&self, peer: &ApplianceId) -> RegistryResult<Option<ThreadDataset>>;
}

pub use memory::InMemoryRegistry;
