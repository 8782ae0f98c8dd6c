//! Error types for the provisioning agent

use thiserror::Error;

use super::types::Step;

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type for state machine and provisioner operations
pub type ProvisionOpResult<T> = Result<T, ProvisionError>;

/// Result type for persistence collaborator operations
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Closed taxonomy of classified provisioning failures
///
/// Everything above the classification boundary sees only these kinds, never
/// the appliance's raw reason codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Credentials rejected by the target network
    AuthFailed,
    /// SSID not visible or reachable from the appliance
    NetworkNotFound,
    /// No terminal status observed within the expected window
    Timeout,
    /// Network-layer join failure distinct from auth
    WifiFailed,
    /// Appliance could not persist credentials locally
    StorageFailed,
    /// Any unclassified failure
    Unknown,
}

impl ErrorKind {
    /// Human-readable message template for this kind
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorKind::AuthFailed => "The network rejected the password. Check it and try again.",
            ErrorKind::NetworkNotFound => {
                "The appliance could not find that network. Check the network name."
            }
            ErrorKind::Timeout => "The appliance did not respond in time. Try again.",
            ErrorKind::WifiFailed => "The appliance could not join the network. Try again.",
            ErrorKind::StorageFailed => "The appliance could not save the settings. Try again.",
            ErrorKind::Unknown => "Something went wrong during setup. Try again.",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::AuthFailed => "auth_failed",
            ErrorKind::NetworkNotFound => "network_not_found",
            ErrorKind::Timeout => "timeout",
            ErrorKind::WifiFailed => "wifi_failed",
            ErrorKind::StorageFailed => "storage_failed",
            ErrorKind::Unknown => "unknown",
        };
        write!(f, "{name}")
    }
}

/// A classified fault recorded in the attempt while the machine is in `error`
///
/// `origin` is the step whose action failed; `retry` re-enters it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningFault {
    pub kind: ErrorKind,
    pub message: String,
    pub origin: Step,
}

impl ProvisioningFault {
    pub fn new(kind: ErrorKind, origin: Step) -> Self {
        Self {
            kind,
            message: kind.user_message().to_string(),
            origin,
        }
    }
}

/// Errors surfaced by the transport layer
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    #[error("Transport unavailable: {0}")]
    Unavailable(String),

    #[error("Discovery failed: {0}")]
    DiscoveryFailed(String),

    #[error("Connect failed: {0}")]
    ConnectFailed(String),

    #[error("Operation timed out")]
    Timeout,

    #[error("Link to the appliance was lost")]
    LinkLost,

    #[error("Session is closed")]
    SessionClosed,

    #[error("Attribute not exposed by the appliance: {0}")]
    AttributeNotFound(String),

    #[error("Transport I/O error: {0}")]
    Io(String),
}

/// Errors returned by state machine and provisioner operations
///
/// Classified protocol failures are not errors here; they land the machine in
/// the `error` state instead. This enum covers caller misuse, host-local
/// validation, and cancellation.
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// Radio disabled or permission denied, before any session exists
    #[error("Transport unavailable; enable the radio and retry")]
    AvailabilityDenied,

    /// Rejected before any transport call; never changes the step
    #[error("Invalid input: {0}")]
    LocalValidation(String),

    #[error("Operation not valid in step {step}")]
    InvalidStep { step: Step },

    #[error("A credential submission is already in flight")]
    SubmissionInProgress,

    #[error("No device with identity {0} has been discovered")]
    UnknownDevice(String),

    /// In-flight operation observed cancellation; not surfaced to the user
    #[error("Cancelled")]
    Cancelled,

    #[error("Wire payload error: {0}")]
    Protocol(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

/// Errors from the persistence collaborator
#[derive(Error, Debug, Clone)]
pub enum RegistryError {
    #[error("Appliance not found: {0}")]
    NotFound(String),

    #[error("Peer appliance is offline: {0}")]
    PeerOffline(String),

    #[error("Registry backend error: {0}")]
    Backend(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_error_kind_display_is_stable() {
        assert_eq!(ErrorKind::AuthFailed.to_string(), "auth_failed");
        assert_eq!(ErrorKind::NetworkNotFound.to_string(), "network_not_found");
        assert_eq!(ErrorKind::Timeout.to_string(), "timeout");
        assert_eq!(ErrorKind::WifiFailed.to_string(), "wifi_failed");
        assert_eq!(ErrorKind::StorageFailed.to_string(), "storage_failed");
        assert_eq!(ErrorKind::Unknown.to_string(), "unknown");
    }

    #[test]
    fn test_every_kind_has_a_user_message() {
        let kinds = [
            ErrorKind::AuthFailed,
            ErrorKind::NetworkNotFound,
            ErrorKind::Timeout,
            ErrorKind::WifiFailed,
            ErrorKind::StorageFailed,
            ErrorKind::Unknown,
        ];
        for kind in kinds {
            assert!(!kind.user_message().is_empty());
        }
    }

    #[test]
    fn test_fault_records_origin_step() {
        let fault = ProvisioningFault::new(ErrorKind::AuthFailed, Step::Configuring);
        assert_eq!(fault.origin, Step::Configuring);
        assert_eq!(fault.message, ErrorKind::AuthFailed.user_message());
    }

    #[test]
    fn test_transport_error_converts_into_provision_error() {
        let err: ProvisionError = TransportError::Timeout.into();
        assert!(matches!(err, ProvisionError::Transport(TransportError::Timeout)));
    }
}
