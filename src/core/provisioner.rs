//! Credential provisioner
//!
//! Submits one credential payload and yields the appliance's status updates
//! until a terminal value. The stream is finite: an overall window bounds the
//! submission, and expiry (or a lost link with no terminal observed) is
//! reported as a synthetic `timed_out` terminal status, not a fault. At most
//! one submission is in flight per provisioner.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::core::error::{ProvisionError, ProvisionOpResult};
use crate::core::types::{ProvisioningStatus, ThreadDataset};
use crate::protocol::{APPLY_THREAD, APPLY_WIFI, chunk_payload, decode_status};
use crate::transport::link::{ApplianceSession, Attribute};

/// One credential payload for submission
#[derive(Debug, Clone)]
pub enum Credentials {
    Wifi { ssid: String, passphrase: String },
    Thread { dataset: ThreadDataset },
}

#[derive(Debug, Clone)]
pub struct CredentialProvisioner {
    window: Duration,
    in_flight: Arc<Mutex<bool>>,
}

impl CredentialProvisioner {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            in_flight: Arc::new(Mutex::new(false)),
        }
    }

    /// Submit credentials and observe the status stream
    ///
    /// The returned channel yields statuses in delivery order and closes after
    /// exactly one terminal value; anything the appliance notifies after its
    /// terminal is discarded.
    pub async fn submit<S: ApplianceSession>(
        &self,
        session: &S,
        credentials: Credentials,
    ) -> ProvisionOpResult<mpsc::Receiver<ProvisioningStatus>> {
        {
            let mut in_flight = self.in_flight.lock().await;
            if *in_flight {
                return Err(ProvisionError::SubmissionInProgress);
            }
            *in_flight = true;
        }

        match self.write_and_observe(session, credentials).await {
            Ok(rx) => Ok(rx),
            Err(e) => {
                *self.in_flight.lock().await = false;
                Err(e)
            }
        }
    }

    async fn write_and_observe<S: ApplianceSession>(
        &self,
        session: &S,
        credentials: Credentials,
    ) -> ProvisionOpResult<mpsc::Receiver<ProvisioningStatus>> {
        // Subscribe before writing so no early status is missed.
        let raw = session.subscribe(Attribute::ProvisionStatus).await?;

        match &credentials {
            Credentials::Wifi { ssid, passphrase } => {
                for chunk in chunk_payload(ssid.as_bytes()) {
                    session.write(Attribute::WifiSsid, &chunk).await?;
                }
                session
                    .write(Attribute::WifiPassphrase, passphrase.as_bytes())
                    .await?;
                session
                    .write(Attribute::ProvisionControl, &[APPLY_WIFI])
                    .await?;
                debug!("Submitted Wi-Fi credentials for SSID '{ssid}'");
            }
            Credentials::Thread { dataset } => {
                session
                    .write(Attribute::ThreadDataset, &dataset.payload)
                    .await?;
                session
                    .write(Attribute::ProvisionControl, &[APPLY_THREAD])
                    .await?;
                debug!("Submitted Thread dataset '{}'", dataset.reference);
            }
        }

        let (tx, rx) = mpsc::channel(16);
        let in_flight = self.in_flight.clone();
        let window = self.window;
        tokio::spawn(async move {
            forward_statuses(raw, tx, window).await;
            *in_flight.lock().await = false;
        });

        Ok(rx)
    }
}

/// Forward decoded statuses until the first terminal, then stop
async fn forward_statuses(
    mut raw: mpsc::Receiver<Vec<u8>>,
    tx: mpsc::Sender<ProvisioningStatus>,
    window: Duration,
) {
    let deadline = Instant::now() + window;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let frame = match tokio::time::timeout(remaining, raw.recv()).await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                // Link dropped without a terminal status.
                warn!("Status stream ended before a terminal status");
                let _ = tx.send(ProvisioningStatus::TimedOut).await;
                return;
            }
            Err(_) => {
                warn!("No terminal status within {window:?}");
                let _ = tx.send(ProvisioningStatus::TimedOut).await;
                return;
            }
        };

        let Some(status) = decode_status(&frame) else {
            debug!("Skipping unrecognized status frame {frame:02x?}");
            continue;
        };

        if tx.send(status).await.is_err() {
            return;
        }
        if status.is_terminal() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::DiscoveredDevice;
    use crate::protocol::status::{
        REASON_AUTH_FAILED, STATUS_APPLYING, STATUS_CONNECTING, STATUS_FAILED, STATUS_READY,
        STATUS_VERIFYING,
    };
    use crate::transport::Transport;
    use crate::transport::mock::{MockSession, MockTransport};
    use pretty_assertions::assert_eq;

    fn candidate() -> DiscoveredDevice {
        DiscoveredDevice {
            identity: "AA:BB:CC:DD:EE:01".into(),
            name: "Hub".into(),
            rssi: Some(-45),
            class_hint: None,
        }
    }

    fn wifi_credentials() -> Credentials {
        Credentials::Wifi {
            ssid: "HomeNet".into(),
            passphrase: "correctpass".into(),
        }
    }

    async fn connected(transport: &MockTransport) -> MockSession {
        transport.connect(&candidate()).await.unwrap()
    }

    async fn drain(mut rx: mpsc::Receiver<ProvisioningStatus>) -> Vec<ProvisioningStatus> {
        let mut statuses = Vec::new();
        while let Some(status) = rx.recv().await {
            statuses.push(status);
        }
        statuses
    }

    #[tokio::test]
    async fn test_successful_submission_yields_ordered_statuses() {
        let transport = MockTransport::new();
        transport
            .script_status_frames(vec![
                vec![STATUS_APPLYING],
                vec![STATUS_CONNECTING],
                vec![STATUS_VERIFYING],
                vec![STATUS_READY],
            ])
            .await;
        let session = connected(&transport).await;

        let provisioner = CredentialProvisioner::new(Duration::from_secs(5));
        let rx = provisioner
            .submit(&session, wifi_credentials())
            .await
            .unwrap();

        let statuses = drain(rx).await;
        assert_eq!(
            statuses,
            vec![
                ProvisioningStatus::Applying,
                ProvisioningStatus::Connecting,
                ProvisioningStatus::Verifying,
                ProvisioningStatus::Ready,
            ]
        );
    }

    #[tokio::test]
    async fn test_exactly_one_terminal_and_nothing_after() {
        let transport = MockTransport::new();
        // Duplicate delivery after the terminal must be discarded.
        transport
            .script_status_frames(vec![
                vec![STATUS_APPLYING],
                vec![STATUS_READY],
                vec![STATUS_READY],
                vec![STATUS_CONNECTING],
            ])
            .await;
        let session = connected(&transport).await;

        let provisioner = CredentialProvisioner::new(Duration::from_secs(5));
        let rx = provisioner
            .submit(&session, wifi_credentials())
            .await
            .unwrap();

        let statuses = drain(rx).await;
        let terminals = statuses.iter().filter(|s| s.is_terminal()).count();
        assert_eq!(terminals, 1);
        assert_eq!(statuses.last(), Some(&ProvisioningStatus::Ready));
    }

    #[tokio::test]
    async fn test_failure_reason_is_forwarded_raw() {
        let transport = MockTransport::new();
        transport
            .script_status_frames(vec![
                vec![STATUS_APPLYING],
                vec![STATUS_FAILED, REASON_AUTH_FAILED],
            ])
            .await;
        let session = connected(&transport).await;

        let provisioner = CredentialProvisioner::new(Duration::from_secs(5));
        let rx = provisioner
            .submit(&session, wifi_credentials())
            .await
            .unwrap();

        let statuses = drain(rx).await;
        assert_eq!(
            statuses.last(),
            Some(&ProvisioningStatus::Failed(REASON_AUTH_FAILED))
        );
    }

    #[tokio::test]
    async fn test_synthetic_timeout_when_no_terminal_arrives() {
        let transport = MockTransport::new();
        transport
            .script_status_frames(vec![vec![STATUS_APPLYING]])
            .await;
        let session = connected(&transport).await;

        let provisioner = CredentialProvisioner::new(Duration::from_millis(50));
        let rx = provisioner
            .submit(&session, wifi_credentials())
            .await
            .unwrap();

        let statuses = drain(rx).await;
        assert_eq!(
            statuses,
            vec![ProvisioningStatus::Applying, ProvisioningStatus::TimedOut]
        );
    }

    #[tokio::test]
    async fn test_lost_link_becomes_synthetic_timeout() {
        let transport = MockTransport::new();
        let session = connected(&transport).await;

        let provisioner = CredentialProvisioner::new(Duration::from_secs(5));
        let rx = provisioner
            .submit(&session, wifi_credentials())
            .await
            .unwrap();

        transport.drop_link().await;
        let statuses = drain(rx).await;
        assert_eq!(statuses, vec![ProvisioningStatus::TimedOut]);
    }

    #[tokio::test]
    async fn test_unrecognized_frames_are_skipped() {
        let transport = MockTransport::new();
        transport
            .script_status_frames(vec![vec![0xee], vec![], vec![STATUS_READY]])
            .await;
        let session = connected(&transport).await;

        let provisioner = CredentialProvisioner::new(Duration::from_secs(5));
        let rx = provisioner
            .submit(&session, wifi_credentials())
            .await
            .unwrap();

        assert_eq!(drain(rx).await, vec![ProvisioningStatus::Ready]);
    }

    #[tokio::test]
    async fn test_overlapping_submission_is_rejected() {
        let transport = MockTransport::new();
        let session = connected(&transport).await;

        let provisioner = CredentialProvisioner::new(Duration::from_secs(5));
        let _rx = provisioner
            .submit(&session, wifi_credentials())
            .await
            .unwrap();

        let second = provisioner.submit(&session, wifi_credentials()).await;
        assert!(matches!(second, Err(ProvisionError::SubmissionInProgress)));
    }

    #[tokio::test]
    async fn test_in_flight_released_after_terminal() {
        let transport = MockTransport::new();
        transport.script_status_frames(vec![vec![STATUS_READY]]).await;
        let session = connected(&transport).await;

        let provisioner = CredentialProvisioner::new(Duration::from_secs(5));
        let rx = provisioner
            .submit(&session, wifi_credentials())
            .await
            .unwrap();
        drain(rx).await;

        // The forwarding task releases the guard after the terminal.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(provisioner.submit(&session, wifi_credentials()).await.is_ok());
    }

    #[tokio::test]
    async fn test_submission_writes_credentials_before_control() {
        let transport = MockTransport::new();
        transport.script_status_frames(vec![vec![STATUS_READY]]).await;
        let session = connected(&transport).await;

        let provisioner = CredentialProvisioner::new(Duration::from_secs(5));
        let rx = provisioner
            .submit(&session, wifi_credentials())
            .await
            .unwrap();
        drain(rx).await;

        let writes = transport.writes().await;
        let attributes: Vec<Attribute> = writes.iter().map(|(a, _)| *a).collect();
        assert_eq!(
            attributes,
            vec![
                Attribute::WifiSsid,
                Attribute::WifiPassphrase,
                Attribute::ProvisionControl,
            ]
        );
        assert_eq!(writes[0].1, b"HomeNet".to_vec());
        assert_eq!(writes[2].1, vec![APPLY_WIFI]);
    }
}
