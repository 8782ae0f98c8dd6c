//! Classification of raw appliance failures into the closed error taxonomy
//!
//! This is the only seam where the appliance's raw reason vocabulary is
//! inspected. The vocabulary evolves with firmware; the table is data, not a
//! hard-coded match, so a host can carry overrides for newer protocol
//! revisions.

use std::collections::HashMap;

use crate::core::{
    error::{ErrorKind, ProvisioningFault, TransportError},
    types::Step,
};
use crate::protocol::status::{
    REASON_AUTH_FAILED, REASON_NETWORK_NOT_FOUND, REASON_STORAGE_FAILED, REASON_WIFI_FAILED,
};

/// Maps raw reason codes and transport faults to [`ErrorKind`]
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    reasons: HashMap<u8, ErrorKind>,
}

impl ErrorClassifier {
    /// Classifier for the default protocol profile
    pub fn new() -> Self {
        let reasons = HashMap::from([
            (REASON_AUTH_FAILED, ErrorKind::AuthFailed),
            (REASON_NETWORK_NOT_FOUND, ErrorKind::NetworkNotFound),
            (REASON_WIFI_FAILED, ErrorKind::WifiFailed),
            (REASON_STORAGE_FAILED, ErrorKind::StorageFailed),
        ]);
        Self { reasons }
    }

    /// Add or override the classification of a raw reason code
    pub fn with_reason(mut self, code: u8, kind: ErrorKind) -> Self {
        self.reasons.insert(code, kind);
        self
    }

    /// Classify a raw failure reason reported by the appliance
    ///
    /// Unrecognized codes fall into [`ErrorKind::Unknown`] rather than being
    /// swallowed.
    pub fn classify_reason(&self, code: u8) -> ErrorKind {
        self.reasons.get(&code).copied().unwrap_or(ErrorKind::Unknown)
    }

    /// Classify a transport-level failure
    ///
    /// A lost link with no terminal status observed is timeout-class; so is an
    /// expired operation.
    pub fn classify_transport(&self, error: &TransportError) -> ErrorKind {
        match error {
            TransportError::Timeout | TransportError::LinkLost | TransportError::SessionClosed => {
                ErrorKind::Timeout
            }
            _ => ErrorKind::Unknown,
        }
    }

    /// Build the fault recorded in the attempt for a classified kind
    pub fn fault(&self, kind: ErrorKind, origin: Step) -> ProvisioningFault {
        ProvisioningFault::new(kind, origin)
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new()
    }
}
