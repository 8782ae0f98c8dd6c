//! Provisioning status wire format
//!
//! The status characteristic notifies a 1-byte state code; a `failed` state
//! carries a second reason byte. The vocabulary here is the default protocol
//! profile; appliances with newer firmware may extend the reason set, which is
//! why classification of reasons lives behind [`crate::core::ErrorClassifier`].

use crate::core::types::ProvisioningStatus;

/// State codes notified by the appliance
pub const STATUS_IDLE: u8 = 0;
pub const STATUS_APPLYING: u8 = 1;
pub const STATUS_CONNECTING: u8 = 2;
pub const STATUS_VERIFYING: u8 = 3;
pub const STATUS_READY: u8 = 4;
pub const STATUS_FAILED: u8 = 5;

/// Default failure reason codes carried after [`STATUS_FAILED`]
pub const REASON_AUTH_FAILED: u8 = 1;
pub const REASON_NETWORK_NOT_FOUND: u8 = 2;
pub const REASON_WIFI_FAILED: u8 = 3;
pub const REASON_STORAGE_FAILED: u8 = 4;

/// Decode a status notification frame
///
/// Returns `None` for frames the host does not understand; the provisioner
/// skips those rather than failing the submission.
pub fn decode_status(frame: &[u8]) -> Option<ProvisioningStatus> {
    match *frame.first()? {
        STATUS_IDLE => Some(ProvisioningStatus::Idle),
        STATUS_APPLYING => Some(ProvisioningStatus::Applying),
        STATUS_CONNECTING => Some(ProvisioningStatus::Connecting),
        STATUS_VERIFYING => Some(ProvisioningStatus::Verifying),
        STATUS_READY => Some(ProvisioningStatus::Ready),
        STATUS_FAILED => {
            // Missing reason byte still counts as a failure; reason 0 is
            // classified as unknown.
            let reason = frame.get(1).copied().unwrap_or(0);
            Some(ProvisioningStatus::Failed(reason))
        }
        _ => None,
    }
}
