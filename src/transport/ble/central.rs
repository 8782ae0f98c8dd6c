//! BLE central transport built on btleplug

use std::collections::HashMap;
use std::sync::Arc;

use btleplug::api::{
    Central, CentralEvent, CentralState, Characteristic, Manager as _, Peripheral as _, ScanFilter,
    WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::StreamExt;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

use crate::core::error::{TransportError, TransportResult};
use crate::core::types::{DiscoveredDevice, HardwareClass};
use crate::transport::ble::uuids::{MANUFACTURER_ID, PROVISIONING_SERVICE_UUID, attribute_uuid};
use crate::transport::link::{ApplianceSession, Attribute, SessionState, Transport};

fn ble_error(e: btleplug::Error) -> TransportError {
    match e {
        btleplug::Error::TimedOut(_) => TransportError::Timeout,
        btleplug::Error::NotConnected => TransportError::LinkLost,
        btleplug::Error::DeviceNotFound => TransportError::ConnectFailed("device not found".into()),
        btleplug::Error::PermissionDenied => {
            TransportError::Unavailable("bluetooth permission denied".into())
        }
        other => TransportError::Io(other.to_string()),
    }
}

/// BLE central transport
///
/// Discovers appliances advertising the provisioning service and opens GATT
/// sessions to them.
pub struct BleTransport {
    adapter: Adapter,
    peripherals: Arc<Mutex<HashMap<String, PeripheralId>>>,
    discovery_task: Arc<Mutex<Option<tokio::task::JoinHandle<()>>>>,
}

impl BleTransport {
    /// Create a transport on the first available Bluetooth adapter
    pub async fn new() -> TransportResult<Self> {
        let manager = Manager::new().await.map_err(ble_error)?;
        let adapter = manager
            .adapters()
            .await
            .map_err(ble_error)?
            .into_iter()
            .next()
            .ok_or_else(|| TransportError::Unavailable("no bluetooth adapter found".into()))?;

        info!("Using BLE adapter");

        Ok(Self {
            adapter,
            peripherals: Arc::new(Mutex::new(HashMap::new())),
            discovery_task: Arc::new(Mutex::new(None)),
        })
    }

    async fn discovered_device(
        adapter: &Adapter,
        id: &PeripheralId,
    ) -> Option<(DiscoveredDevice, PeripheralId)> {
        let peripheral = adapter.peripheral(id).await.ok()?;
        let props = peripheral.properties().await.ok()??;

        // The scan filter should already restrict to the provisioning service,
        // but some platforms deliver unfiltered events.
        if !props.services.contains(&PROVISIONING_SERVICE_UUID) {
            return None;
        }

        let class_hint = props
            .manufacturer_data
            .get(&MANUFACTURER_ID)
            .and_then(|data| data.first())
            .and_then(|byte| HardwareClass::try_from(*byte).ok());

        let device = DiscoveredDevice {
            identity: peripheral.address().to_string(),
            name: props.local_name.unwrap_or_else(|| "Unknown".to_string()),
            rssi: props.rssi,
            class_hint,
        };
        Some((device, id.clone()))
    }
}

impl Transport for BleTransport {
    type Session = BleApplianceSession;

    async fn is_available(&self) -> bool {
        match self.adapter.adapter_state().await {
            Ok(CentralState::PoweredOff) => false,
            Ok(_) => true,
            Err(e) => {
                warn!("Failed to query adapter state: {e}");
                false
            }
        }
    }

    async fn start_discovery(&self) -> TransportResult<mpsc::Receiver<DiscoveredDevice>> {
        let mut events = self.adapter.events().await.map_err(ble_error)?;
        self.adapter
            .start_scan(ScanFilter {
                services: vec![PROVISIONING_SERVICE_UUID],
            })
            .await
            .map_err(ble_error)?;

        info!("BLE discovery started");

        let (tx, rx) = mpsc::channel(16);
        let adapter = self.adapter.clone();
        let peripherals = self.peripherals.clone();

        let task = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let id = match event {
                    CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => id,
                    _ => continue,
                };
                let Some((device, id)) = Self::discovered_device(&adapter, &id).await else {
                    continue;
                };
                debug!(
                    "Discovered appliance '{}' ({}) rssi={:?}",
                    device.name, device.identity, device.rssi
                );
                peripherals.lock().await.insert(device.identity.clone(), id);
                if tx.send(device).await.is_err() {
                    break;
                }
            }
            debug!("BLE discovery event loop ended");
        });

        *self.discovery_task.lock().await = Some(task);
        Ok(rx)
    }

    async fn stop_discovery(&self) -> TransportResult<()> {
        if let Some(task) = self.discovery_task.lock().await.take() {
            task.abort();
        }
        self.adapter.stop_scan().await.map_err(ble_error)?;
        info!("BLE discovery stopped");
        Ok(())
    }

    async fn connect(&self, candidate: &DiscoveredDevice) -> TransportResult<Self::Session> {
        let id = self
            .peripherals
            .lock()
            .await
            .get(&candidate.identity)
            .cloned()
            .ok_or_else(|| TransportError::ConnectFailed(candidate.identity.clone()))?;

        let peripheral = self.adapter.peripheral(&id).await.map_err(ble_error)?;
        peripheral.connect().await.map_err(ble_error)?;
        peripheral.discover_services().await.map_err(ble_error)?;

        let mut characteristics: HashMap<Attribute, Characteristic> = HashMap::new();
        for attribute in [
            Attribute::SetupKey,
            Attribute::SerialNumber,
            Attribute::HardwareClass,
            Attribute::FirmwareVersion,
            Attribute::WifiScanControl,
            Attribute::WifiScanResults,
            Attribute::WifiSsid,
            Attribute::WifiPassphrase,
            Attribute::ThreadDataset,
            Attribute::ProvisionControl,
            Attribute::ProvisionStatus,
            Attribute::ConsumerOutput,
        ] {
            let uuid = attribute_uuid(attribute);
            if let Some(c) = peripheral.characteristics().iter().find(|c| c.uuid == uuid) {
                characteristics.insert(attribute, c.clone());
            }
        }

        info!("Connected to '{}'", candidate.name);

        Ok(BleApplianceSession {
            peripheral,
            characteristics,
            closed: Arc::new(Mutex::new(false)),
        })
    }
}

/// One live GATT session to an appliance
pub struct BleApplianceSession {
    peripheral: Peripheral,
    characteristics: HashMap<Attribute, Characteristic>,
    closed: Arc<Mutex<bool>>,
}

impl BleApplianceSession {
    fn characteristic(&self, attribute: Attribute) -> TransportResult<&Characteristic> {
        self.characteristics
            .get(&attribute)
            .ok_or_else(|| TransportError::AttributeNotFound(attribute.to_string()))
    }

    async fn ensure_open(&self) -> TransportResult<()> {
        if *self.closed.lock().await {
            return Err(TransportError::SessionClosed);
        }
        Ok(())
    }
}

impl ApplianceSession for BleApplianceSession {
    async fn state(&self) -> SessionState {
        if *self.closed.lock().await {
            return SessionState::Closed;
        }
        match self.peripheral.is_connected().await {
            Ok(true) => SessionState::Ready,
            _ => SessionState::Closed,
        }
    }

    async fn read(&self, attribute: Attribute) -> TransportResult<Vec<u8>> {
        self.ensure_open().await?;
        let characteristic = self.characteristic(attribute)?;
        self.peripheral.read(characteristic).await.map_err(ble_error)
    }

    async fn write(&self, attribute: Attribute, value: &[u8]) -> TransportResult<()> {
        self.ensure_open().await?;
        let characteristic = self.characteristic(attribute)?;
        self.peripheral
            .write(characteristic, value, WriteType::WithResponse)
            .await
            .map_err(ble_error)
    }

    async fn subscribe(&self, attribute: Attribute) -> TransportResult<mpsc::Receiver<Vec<u8>>> {
        self.ensure_open().await?;
        let characteristic = self.characteristic(attribute)?.clone();
        self.peripheral
            .subscribe(&characteristic)
            .await
            .map_err(ble_error)?;

        let mut notifications = self.peripheral.notifications().await.map_err(ble_error)?;
        let (tx, rx) = mpsc::channel(16);
        let uuid = characteristic.uuid;

        // The notification stream ends when the peripheral disconnects, which
        // closes the channel and surfaces the link loss to the consumer.
        tokio::spawn(async move {
            while let Some(notification) = notifications.next().await {
                if notification.uuid != uuid {
                    continue;
                }
                if tx.send(notification.value).await.is_err() {
                    break;
                }
            }
            debug!("Notification stream for {uuid} ended");
        });

        Ok(rx)
    }

    async fn close(&self) -> TransportResult<()> {
        let mut closed = self.closed.lock().await;
        if *closed {
            return Ok(());
        }
        *closed = true;

        if let Err(e) = self.peripheral.disconnect().await {
            // Already-dropped links are fine; close stays idempotent.
            debug!("Disconnect reported: {e}");
        }
        info!("Session closed");
        Ok(())
    }
}
