//! Wi-Fi network scan relay
//!
//! Asks the connected appliance to scan for visible networks and relays the
//! result list back. Results are read as a JSON payload in attribute-sized
//! chunks, an empty chunk terminating the read. An appliance that has not
//! finished scanning serves an empty payload, so the relay polls until the
//! payload appears or the window expires; a finished scan with zero networks
//! is the non-empty payload `[]`.

use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::debug;

use crate::core::error::{ProvisionError, ProvisionOpResult, TransportError};
use crate::core::types::WifiNetwork;
use crate::protocol::{SCAN_START, decode_scan_results};
use crate::transport::link::{ApplianceSession, Attribute};

#[derive(Debug, Clone)]
pub struct NetworkScanRelay {
    window: Duration,
    poll_interval: Duration,
}

impl NetworkScanRelay {
    pub fn new(window: Duration, poll_interval: Duration) -> Self {
        Self {
            window,
            poll_interval,
        }
    }

    /// Run one scan on the appliance and relay the network list
    ///
    /// Order is the appliance's own scan order; entries are never
    /// deduplicated here.
    pub async fn relay<S: ApplianceSession>(
        &self,
        session: &S,
    ) -> ProvisionOpResult<Vec<WifiNetwork>> {
        session
            .write(Attribute::WifiScanControl, &[SCAN_START])
            .await?;

        let deadline = Instant::now() + self.window;
        loop {
            let payload = self.read_payload(session).await?;
            if !payload.is_empty() {
                let networks = decode_scan_results(&payload)?;
                debug!("Relayed {} networks from appliance", networks.len());
                return Ok(networks);
            }
            if Instant::now() >= deadline {
                return Err(ProvisionError::Transport(TransportError::Timeout));
            }
            sleep(self.poll_interval).await;
        }
    }

    async fn read_payload<S: ApplianceSession>(&self, session: &S) -> ProvisionOpResult<Vec<u8>> {
        let mut payload = Vec::new();
        loop {
            let chunk = session.read(Attribute::WifiScanResults).await?;
            if chunk.is_empty() {
                return Ok(payload);
            }
            payload.extend_from_slice(&chunk);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::DiscoveredDevice;
    use crate::protocol::MAX_CHUNK_SIZE;
    use crate::transport::Transport;
    use crate::transport::mock::MockTransport;
    use pretty_assertions::assert_eq;

    fn candidate() -> DiscoveredDevice {
        DiscoveredDevice {
            identity: "AA:BB:CC:DD:EE:01".into(),
            name: "Hub".into(),
            rssi: Some(-45),
            class_hint: None,
        }
    }

    fn relay() -> NetworkScanRelay {
        NetworkScanRelay::new(Duration::from_millis(200), Duration::from_millis(10))
    }

    #[tokio::test]
    async fn test_relay_parses_network_list() {
        let transport = MockTransport::new();
        transport
            .set_scan_payload(
                br#"[{"ssid":"HomeNet","secured":true,"rssi":-50}]"#.to_vec(),
            )
            .await;
        let session = transport.connect(&candidate()).await.unwrap();

        let networks = relay().relay(&session).await.unwrap();
        assert_eq!(networks.len(), 1);
        assert_eq!(networks[0].ssid, "HomeNet");
        assert!(networks[0].secured);
        assert_eq!(networks[0].rssi, -50);
    }

    #[tokio::test]
    async fn test_relay_reassembles_chunked_payload() {
        // Build a payload longer than one chunk.
        let mut networks = Vec::new();
        for i in 0..10 {
            networks.push(crate::core::types::WifiNetwork {
                ssid: format!("Network-{i}"),
                secured: i % 2 == 0,
                rssi: -40 - i as i16,
            });
        }
        let payload = serde_json::to_vec(&networks).unwrap();
        assert!(payload.len() > MAX_CHUNK_SIZE);

        let transport = MockTransport::new();
        transport.set_scan_payload(payload).await;
        let session = transport.connect(&candidate()).await.unwrap();

        let relayed = relay().relay(&session).await.unwrap();
        assert_eq!(relayed, networks);
    }

    #[tokio::test]
    async fn test_relay_keeps_duplicate_ssids() {
        let transport = MockTransport::new();
        transport
            .set_scan_payload(
                br#"[{"ssid":"HomeNet","secured":true,"rssi":-50},{"ssid":"HomeNet","secured":false,"rssi":-60}]"#
                    .to_vec(),
            )
            .await;
        let session = transport.connect(&candidate()).await.unwrap();

        let networks = relay().relay(&session).await.unwrap();
        assert_eq!(networks.len(), 2);
    }

    #[tokio::test]
    async fn test_relay_times_out_when_results_never_appear() {
        let transport = MockTransport::new();
        let session = transport.connect(&candidate()).await.unwrap();

        let result = relay().relay(&session).await;
        assert!(matches!(
            result,
            Err(ProvisionError::Transport(TransportError::Timeout))
        ));
    }
}
