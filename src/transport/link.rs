//! Transport trait definitions

use tokio::sync::mpsc;
use trait_variant::make;

use crate::core::error::TransportResult;
use crate::core::types::DiscoveredDevice;

/// Attributes exposed by an appliance's provisioning service
///
/// The transport implementation maps each to its concrete identifier (a GATT
/// characteristic UUID for BLE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    /// Setup-key proof written after connecting
    SetupKey,
    /// Serial / unit identifier (UTF-8, read)
    SerialNumber,
    /// Hardware class byte (read)
    HardwareClass,
    /// Firmware version string (UTF-8, read)
    FirmwareVersion,
    /// Wi-Fi scan control (write to start)
    WifiScanControl,
    /// Wi-Fi scan results (chunked read)
    WifiScanResults,
    /// Target network SSID (chunked write)
    WifiSsid,
    /// Target network passphrase (write)
    WifiPassphrase,
    /// Thread dataset blob (write)
    ThreadDataset,
    /// Provision control (write to apply credentials)
    ProvisionControl,
    /// Provisioning status (subscribe)
    ProvisionStatus,
    /// Opaque acknowledgment payload (read after success)
    ConsumerOutput,
}

impl std::fmt::Display for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Lifecycle state of a connection session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Ready,
    Closed,
}

/// Transport able to discover appliances and open sessions to them
///
/// Discovery and an open session contend for the radio; the state machine
/// stops discovery before connecting.
#[make(Send)]
pub trait Transport: Send + Sync + 'static {
    type Session: ApplianceSession;

    /// Whether the underlying radio is present and powered
    async fn is_available(&self) -> bool;

    /// Begin discovery of appliances advertising the provisioning service
    ///
    /// Events arrive on the returned channel until [`Transport::stop_discovery`]
    /// is called. Duplicate advertisements for one identity may arrive; the
    /// consumer deduplicates.
    async fn start_discovery(&self) -> TransportResult<mpsc::Receiver<DiscoveredDevice>>;

    /// Stop an active discovery; idempotent
    async fn stop_discovery(&self) -> TransportResult<()>;

    /// Open a session to the given candidate
    async fn connect(&self, candidate: &DiscoveredDevice) -> TransportResult<Self::Session>;
}

/// One live link to one appliance
///
/// `close` is idempotent and safe from any state; pending operations against a
/// closed session fail fast with [`crate::TransportError::SessionClosed`]. A
/// link lost asynchronously terminates any subscription stream rather than
/// stalling it.
#[make(Send)]
pub trait ApplianceSession: Send + Sync + 'static {
    /// Current lifecycle state
    async fn state(&self) -> SessionState;

    /// Read an attribute value
    async fn read(&self, attribute: Attribute) -> TransportResult<Vec<u8>>;

    /// Write an attribute value
    async fn write(&self, attribute: Attribute, value: &[u8]) -> TransportResult<()>;

    /// Subscribe to notifications for an attribute
    ///
    /// The channel closes when the session closes or the link drops.
    async fn subscribe(&self, attribute: Attribute) -> TransportResult<mpsc::Receiver<Vec<u8>>>;

    /// Tear the session down; idempotent
    async fn close(&self) -> TransportResult<()>;
}
