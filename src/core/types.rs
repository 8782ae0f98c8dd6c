//! Domain types for appliance provisioning

use serde::{Deserialize, Serialize};

/// Hardware class of an appliance, read once per session
///
/// The class decides the provisioning branch: Hubs take Wi-Fi credentials
/// directly, Crates join the Thread mesh owned by an already-provisioned Hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum HardwareClass {
    Hub = 1,
    Crate = 2,
}

impl TryFrom<u8> for HardwareClass {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            1 => Ok(HardwareClass::Hub),
            2 => Ok(HardwareClass::Crate),
            _ => Err(()),
        }
    }
}

impl From<HardwareClass> for u8 {
    fn from(class: HardwareClass) -> Self {
        class as u8
    }
}

/// An appliance seen during transport discovery
///
/// Ephemeral: superseded by each new scan result set. `identity` is the
/// advertised address token and is the deduplication key, not `name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    /// Advertised identity token (transport address)
    pub identity: String,
    /// Human-readable advertised name
    pub name: String,
    /// Signal strength in dBm, more negative is weaker
    pub rssi: Option<i16>,
    /// Hardware class hint from advertisement data, if present
    pub class_hint: Option<HardwareClass>,
}

/// Static identity attributes read from a connected appliance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Serial / unit identifier
    pub serial: String,
    /// Hardware class
    pub class: HardwareClass,
    /// Firmware version string
    pub firmware_version: String,
}

/// A Wi-Fi network visible from the appliance
///
/// Two entries may share an SSID with different security; the list is never
/// deduplicated on relay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WifiNetwork {
    /// Network SSID
    pub ssid: String,
    /// Whether the network requires credentials
    pub secured: bool,
    /// Signal strength in dBm as seen by the appliance
    pub rssi: i16,
}

/// Opaque Thread network credential blob held by a Hub
///
/// Only `reference` ever crosses the persistence boundary; the payload stays
/// between the peer Hub and the appliance being provisioned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadDataset {
    /// Stable reference used to identify the dataset in device records
    pub reference: String,
    /// Raw dataset bytes relayed to the follower appliance
    pub payload: Vec<u8>,
}

/// Status reported by the appliance while applying credentials
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisioningStatus {
    Idle,
    Applying,
    Connecting,
    Verifying,
    /// Terminal: credentials applied and the network join verified
    Ready,
    /// Terminal: the appliance reported a failure with a raw reason code
    Failed(u8),
    /// Terminal: synthesized by the host when no terminal status arrived in time
    TimedOut,
}

impl ProvisioningStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProvisioningStatus::Ready | ProvisioningStatus::Failed(_) | ProvisioningStatus::TimedOut
        )
    }
}

/// Steps of the provisioning state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    #[default]
    Scanning,
    Selecting,
    Connecting,
    Configuring,
    Error,
    Complete,
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Step::Scanning => "scanning",
            Step::Selecting => "selecting",
            Step::Connecting => "connecting",
            Step::Configuring => "configuring",
            Step::Error => "error",
            Step::Complete => "complete",
        };
        write!(f, "{name}")
    }
}

/// Whether a session provisions a new appliance or rotates credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionMode {
    /// First-time setup; the appliance is claimed at persistence time
    Initial,
    /// Credential rotation for a known appliance; claiming is skipped
    Reprovision { appliance: ApplianceId },
}

/// Identifier of a claimed appliance in the device registry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplianceId(pub String);

impl std::fmt::Display for ApplianceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Network identity stored against a device record
///
/// Never carries the passphrase; Thread stores the dataset reference only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NetworkIdentity {
    Wifi { ssid: String },
    Thread { dataset_reference: String },
}

/// Outcome handed to the persistence collaborator on success
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionResult {
    /// Serial of the provisioned appliance
    pub serial: String,
    /// Chosen device name
    pub name: String,
    /// Network the appliance joined
    pub network: NetworkIdentity,
    /// Opaque acknowledgment payload returned by the appliance, hex-rendered
    #[serde(with = "hex_bytes")]
    pub consumer_output: Vec<u8>,
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_hardware_class_round_trip() {
        assert_eq!(HardwareClass::try_from(1u8), Ok(HardwareClass::Hub));
        assert_eq!(HardwareClass::try_from(2u8), Ok(HardwareClass::Crate));
        assert!(HardwareClass::try_from(0u8).is_err());
        assert!(HardwareClass::try_from(7u8).is_err());
        assert_eq!(u8::from(HardwareClass::Crate), 2);
    }

    #[test]
    fn test_status_terminality() {
        assert!(!ProvisioningStatus::Applying.is_terminal());
        assert!(!ProvisioningStatus::Connecting.is_terminal());
        assert!(!ProvisioningStatus::Verifying.is_terminal());
        assert!(ProvisioningStatus::Ready.is_terminal());
        assert!(ProvisioningStatus::Failed(3).is_terminal());
        assert!(ProvisioningStatus::TimedOut.is_terminal());
    }

    #[test]
    fn test_provision_result_serialization_has_no_password_field() {
        let result = ProvisionResult {
            serial: "HUB-1".into(),
            name: "Kitchen Hub".into(),
            network: NetworkIdentity::Wifi {
                ssid: "HomeNet".into(),
            },
            consumer_output: vec![0xde, 0xad],
        };

        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains(r#""ssid":"HomeNet""#));
        assert!(json.contains(r#""consumer_output":"dead""#));
        assert!(!json.contains("password"));
        assert!(!json.contains("passphrase"));

        let back: ProvisionResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn test_thread_identity_stores_reference_only() {
        let identity = NetworkIdentity::Thread {
            dataset_reference: "dataset-77".into(),
        };
        let json = serde_json::to_string(&identity).unwrap();
        assert!(json.contains(r#""dataset_reference":"dataset-77""#));
        assert!(!json.contains("payload"));
    }
}
