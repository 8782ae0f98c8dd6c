//! In-memory device registry
//!
//! Reference implementation of the persistence contract, used by tests and
//! the CLI binary.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::core::error::{RegistryError, RegistryResult};
use crate::core::types::{ApplianceId, ProvisionResult, ThreadDataset};
use crate::registry::{ApplianceRecord, DeviceRegistry};

#[derive(Debug, Default)]
struct RegistryState {
    records: HashMap<String, ApplianceRecord>,
    datasets: HashMap<ApplianceId, ThreadDataset>,
    online_peers: HashSet<ApplianceId>,
    updates: Vec<ProvisioningUpdate>,
    next_id: u32,
}

/// One recorded `update_provisioning` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningUpdate {
    pub appliance: ApplianceId,
    pub user: String,
    pub name: String,
    pub result: ProvisionResult,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryRegistry {
    inner: Arc<Mutex<RegistryState>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a peer Hub as online with a dataset to share
    pub async fn add_online_peer(&self, peer: ApplianceId, dataset: ThreadDataset) {
        let mut state = self.inner.lock().await;
        state.online_peers.insert(peer.clone());
        state.datasets.insert(peer, dataset);
    }

    /// Register a peer Hub as online without a dataset
    pub async fn add_online_peer_without_dataset(&self, peer: ApplianceId) {
        self.inner.lock().await.online_peers.insert(peer);
    }

    /// All provisioning updates stored so far
    pub async fn updates(&self) -> Vec<ProvisioningUpdate> {
        self.inner.lock().await.updates.clone()
    }

    /// Number of claim calls observed, by counting stored records
    pub async fn claimed_serials(&self) -> Vec<String> {
        self.inner.lock().await.records.keys().cloned().collect()
    }
}

impl DeviceRegistry for InMemoryRegistry {
    async fn claim_appliance(&self, serial: &str) -> RegistryResult<ApplianceRecord> {
        let mut state = self.inner.lock().await;
        if let Some(record) = state.records.get(serial) {
            return Ok(record.clone());
        }
        state.next_id += 1;
        let record = ApplianceRecord {
            id: ApplianceId(format!("appliance-{}", state.next_id)),
            serial: serial.to_string(),
            name: None,
        };
        state.records.insert(serial.to_string(), record.clone());
        Ok(record)
    }

    async fn update_provisioning(
        &self,
        appliance: &ApplianceId,
        user: &str,
        name: &str,
        result: &ProvisionResult,
    ) -> RegistryResult<()> {
        let mut state = self.inner.lock().await;
        if let Some(record) = state
            .records
            .values_mut()
            .find(|record| &record.id == appliance)
        {
            record.name = Some(name.to_string());
        }
        state.updates.push(ProvisioningUpdate {
            appliance: appliance.clone(),
            user: user.to_string(),
            name: name.to_string(),
            result: result.clone(),
        });
        Ok(())
    }

    async fn thread_dataset(&self, peer: &ApplianceId) -> RegistryResult<Option<ThreadDataset>> {
        let state = self.inner.lock().await;
        if !state.online_peers.contains(peer) {
            return Err(RegistryError::PeerOffline(peer.to_string()));
        }
        Ok(state.datasets.get(peer).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::NetworkIdentity;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_claim_is_idempotent_per_serial() {
        let registry = InMemoryRegistry::new();
        let first = registry.claim_appliance("HUB-1").await.unwrap();
        let second = registry.claim_appliance("HUB-1").await.unwrap();
        assert_eq!(first.id, second.id);

        let other = registry.claim_appliance("HUB-2").await.unwrap();
        assert_ne!(first.id, other.id);
    }

    #[tokio::test]
    async fn test_update_provisioning_is_recorded() {
        let registry = InMemoryRegistry::new();
        let record = registry.claim_appliance("HUB-1").await.unwrap();

        let result = ProvisionResult {
            serial: "HUB-1".into(),
            name: "Kitchen Hub".into(),
            network: NetworkIdentity::Wifi {
                ssid: "HomeNet".into(),
            },
            consumer_output: vec![],
        };
        registry
            .update_provisioning(&record.id, "user-1", "Kitchen Hub", &result)
            .await
            .unwrap();

        let updates = registry.updates().await;
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].user, "user-1");
        assert_eq!(updates[0].result, result);
    }

    #[tokio::test]
    async fn test_thread_dataset_requires_online_peer() {
        let registry = InMemoryRegistry::new();
        let peer = ApplianceId("appliance-9".into());

        assert!(matches!(
            registry.thread_dataset(&peer).await,
            Err(RegistryError::PeerOffline(_))
        ));

        registry.add_online_peer_without_dataset(peer.clone()).await;
        assert_eq!(registry.thread_dataset(&peer).await.unwrap(), None);

        let dataset = ThreadDataset {
            reference: "ds-1".into(),
            payload: vec![1, 2, 3],
        };
        registry.add_online_peer(peer.clone(), dataset.clone()).await;
        assert_eq!(registry.thread_dataset(&peer).await.unwrap(), Some(dataset));
    }
}
