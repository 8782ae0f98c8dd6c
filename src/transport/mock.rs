//! Mock transport for testing
//!
//! Plays the appliance side of the provisioning protocol: scripted discovery
//! events, attribute values, chunked scan results, and status notification
//! sequences, without requiring a radio.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};

use crate::core::error::{TransportError, TransportResult};
use crate::core::types::DiscoveredDevice;
use crate::protocol::{MAX_CHUNK_SIZE, SCAN_START};
use crate::transport::link::{ApplianceSession, Attribute, SessionState, Transport};

/// Internal state shared by the transport and its sessions
#[derive(Debug)]
struct MockState {
    available: bool,
    devices: Vec<DiscoveredDevice>,
    discovery_tx: Option<mpsc::Sender<DiscoveredDevice>>,
    connect_failure: Option<TransportError>,
    connect_delay: Option<Duration>,
    attributes: HashMap<Attribute, Vec<u8>>,
    scan_payload: Vec<u8>,
    scan_started: bool,
    scan_offset: usize,
    status_script: Vec<Vec<u8>>,
    status_tx: Option<mpsc::Sender<Vec<u8>>>,
    writes: Vec<(Attribute, Vec<u8>)>,
    ready_sessions: usize,
}

impl MockState {
    fn new() -> Self {
        Self {
            available: true,
            devices: Vec::new(),
            discovery_tx: None,
            connect_failure: None,
            connect_delay: None,
            attributes: HashMap::new(),
            scan_payload: Vec::new(),
            scan_started: false,
            scan_offset: 0,
            status_script: Vec::new(),
            status_tx: None,
            writes: Vec::new(),
            ready_sessions: 0,
        }
    }
}

/// Mock transport for testing
#[derive(Debug, Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockState::new())),
        }
    }

    /// Configure radio availability
    pub async fn set_available(&self, available: bool) {
        self.inner.lock().await.available = available;
    }

    /// Devices emitted immediately when discovery starts
    pub async fn set_discovered(&self, devices: Vec<DiscoveredDevice>) {
        self.inner.lock().await.devices = devices;
    }

    /// Emit a discovery event into an active discovery
    pub async fn emit_device(&self, device: DiscoveredDevice) {
        let tx = self.inner.lock().await.discovery_tx.clone();
        if let Some(tx) = tx {
            let _ = tx.send(device).await;
        }
    }

    /// Configure connect attempts to fail
    pub async fn set_connect_failure(&self, error: Option<TransportError>) {
        self.inner.lock().await.connect_failure = error;
    }

    /// Delay connect completion, for cancellation and timeout tests
    pub async fn set_connect_delay(&self, delay: Option<Duration>) {
        self.inner.lock().await.connect_delay = delay;
    }

    /// Set the value served for an attribute read
    pub async fn set_attribute(&self, attribute: Attribute, value: Vec<u8>) {
        self.inner.lock().await.attributes.insert(attribute, value);
    }

    /// Set the JSON payload served in chunks after a scan control write
    pub async fn set_scan_payload(&self, payload: Vec<u8>) {
        self.inner.lock().await.scan_payload = payload;
    }

    /// Status frames notified after a provision control write
    ///
    /// An empty script leaves the subscription open with no terminal, which
    /// exercises the host-side timeout.
    pub async fn script_status_frames(&self, frames: Vec<Vec<u8>>) {
        self.inner.lock().await.status_script = frames;
    }

    /// Simulate an asynchronous link drop: status subscriptions terminate
    pub async fn drop_link(&self) {
        self.inner.lock().await.status_tx = None;
    }

    /// All attribute writes observed, in order
    pub async fn writes(&self) -> Vec<(Attribute, Vec<u8>)> {
        self.inner.lock().await.writes.clone()
    }

    /// Number of sessions currently ready
    pub async fn ready_sessions(&self) -> usize {
        self.inner.lock().await.ready_sessions
    }

    /// Whether a discovery is currently active
    pub async fn discovery_active(&self) -> bool {
        self.inner.lock().await.discovery_tx.is_some()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockTransport {
    type Session = MockSession;

    async fn is_available(&self) -> bool {
        self.inner.lock().await.available
    }

    async fn start_discovery(&self) -> TransportResult<mpsc::Receiver<DiscoveredDevice>> {
        let (tx, rx) = mpsc::channel(16);
        let mut state = self.inner.lock().await;
        if !state.available {
            return Err(TransportError::Unavailable("mock radio disabled".into()));
        }
        for device in state.devices.clone() {
            let _ = tx.try_send(device);
        }
        state.discovery_tx = Some(tx);
        Ok(rx)
    }

    async fn stop_discovery(&self) -> TransportResult<()> {
        self.inner.lock().await.discovery_tx = None;
        Ok(())
    }

    async fn connect(&self, _candidate: &DiscoveredDevice) -> TransportResult<Self::Session> {
        let (failure, delay) = {
            let state = self.inner.lock().await;
            (state.connect_failure.clone(), state.connect_delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = failure {
            return Err(error);
        }

        self.inner.lock().await.ready_sessions += 1;
        Ok(MockSession {
            shared: self.inner.clone(),
            closed: Arc::new(Mutex::new(false)),
        })
    }
}

/// Session handle produced by [`MockTransport::connect`]
#[derive(Debug, Clone)]
pub struct MockSession {
    shared: Arc<Mutex<MockState>>,
    closed: Arc<Mutex<bool>>,
}

impl MockSession {
    async fn ensure_open(&self) -> TransportResult<()> {
        if *self.closed.lock().await {
            return Err(TransportError::SessionClosed);
        }
        Ok(())
    }
}

impl ApplianceSession for MockSession {
    async fn state(&self) -> SessionState {
        if *self.closed.lock().await {
            SessionState::Closed
        } else {
            SessionState::Ready
        }
    }

    async fn read(&self, attribute: Attribute) -> TransportResult<Vec<u8>> {
        self.ensure_open().await?;
        let mut state = self.shared.lock().await;

        if attribute == Attribute::WifiScanResults {
            if !state.scan_started {
                return Ok(Vec::new());
            }
            let payload = state.scan_payload.clone();
            let offset = state.scan_offset;
            if offset >= payload.len() {
                state.scan_offset = 0;
                state.scan_started = false;
                return Ok(Vec::new());
            }
            let end = usize::min(offset + MAX_CHUNK_SIZE, payload.len());
            state.scan_offset = end;
            return Ok(payload[offset..end].to_vec());
        }

        state
            .attributes
            .get(&attribute)
            .cloned()
            .ok_or_else(|| TransportError::AttributeNotFound(attribute.to_string()))
    }

    async fn write(&self, attribute: Attribute, value: &[u8]) -> TransportResult<()> {
        self.ensure_open().await?;
        let mut state = self.shared.lock().await;
        state.writes.push((attribute, value.to_vec()));

        match attribute {
            Attribute::WifiScanControl if value.first() == Some(&SCAN_START) => {
                state.scan_started = true;
                state.scan_offset = 0;
            }
            Attribute::ProvisionControl => {
                let frames = state.status_script.clone();
                if let Some(tx) = state.status_tx.clone() {
                    tokio::spawn(async move {
                        for frame in frames {
                            if tx.send(frame).await.is_err() {
                                break;
                            }
                        }
                    });
                }
            }
            _ => {}
        }
        Ok(())
    }

    async fn subscribe(&self, attribute: Attribute) -> TransportResult<mpsc::Receiver<Vec<u8>>> {
        self.ensure_open().await?;
        if attribute != Attribute::ProvisionStatus {
            return Err(TransportError::AttributeNotFound(attribute.to_string()));
        }
        let (tx, rx) = mpsc::channel(16);
        self.shared.lock().await.status_tx = Some(tx);
        Ok(rx)
    }

    async fn close(&self) -> TransportResult<()> {
        let mut closed = self.closed.lock().await;
        if !*closed {
            *closed = true;
            let mut state = self.shared.lock().await;
            state.ready_sessions = state.ready_sessions.saturating_sub(1);
            state.status_tx = None;
        }
        Ok(())
    }
}
