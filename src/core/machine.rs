//! Provisioning state machine
//!
//! Orchestrates discovery, connection, credential exchange, and status
//! observation for one provisioning session. All session state lives in the
//! owned [`ProvisioningAttempt`]; components never mutate step or fault fields
//! themselves.
//!
//! Protocol-level failures are a state, not an `Err`: they land the machine in
//! `error` with a classified fault and the operation returns `Ok(())`. Only
//! caller misuse, local validation, submission overlap, and cancellation
//! return errors.

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock, mpsc, watch};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::core::{
    attempt::ProvisioningAttempt,
    classifier::ErrorClassifier,
    error::{ErrorKind, ProvisionError, ProvisionOpResult, RegistryError, TransportError},
    provisioner::{CredentialProvisioner, Credentials},
    relay::NetworkScanRelay,
    types::{
        ApplianceId, DiscoveredDevice, HardwareClass, NetworkIdentity, ProvisionResult,
        ProvisioningStatus, SessionMode, Step,
    },
};
use crate::protocol::{decode_device_info, setup_key, wire::decode_utf8};
use crate::registry::DeviceRegistry;
use crate::transport::link::{ApplianceSession, Attribute, SessionState, Transport};

/// Resolves once the cancellation flag is raised
async fn await_cancel(mut rx: watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            // Sender gone; nothing will ever cancel this future.
            std::future::pending::<()>().await;
        }
    }
}

/// Provisioning state machine for one session
pub struct ProvisioningMachine<T: Transport, R: DeviceRegistry> {
    transport: Arc<T>,
    registry: Arc<R>,
    settings: Settings,
    mode: SessionMode,
    classifier: ErrorClassifier,
    provisioner: CredentialProvisioner,
    relay: NetworkScanRelay,
    attempt: Arc<RwLock<ProvisioningAttempt>>,
    session: Arc<RwLock<Option<Arc<T::Session>>>>,
    discovery_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
    cancel_tx: watch::Sender<bool>,
}

impl<T: Transport, R: DeviceRegistry> ProvisioningMachine<T, R> {
    /// Create a machine for first-time setup
    pub fn new(transport: Arc<T>, registry: Arc<R>, settings: Settings) -> Self {
        Self::with_mode(transport, registry, settings, SessionMode::Initial)
    }

    /// Create a machine for the given session mode
    pub fn with_mode(
        transport: Arc<T>,
        registry: Arc<R>,
        settings: Settings,
        mode: SessionMode,
    ) -> Self {
        let (cancel_tx, _) = watch::channel(false);
        let provisioner = CredentialProvisioner::new(settings.submit_timeout);
        let relay = NetworkScanRelay::new(settings.scan_relay_timeout, settings.scan_relay_poll);
        Self {
            transport,
            registry,
            settings,
            mode,
            classifier: ErrorClassifier::new(),
            provisioner,
            relay,
            attempt: Arc::new(RwLock::new(ProvisioningAttempt::new())),
            session: Arc::new(RwLock::new(None)),
            discovery_task: Mutex::new(None),
            cancel_tx,
        }
    }

    /// Replace the error classifier, e.g. with firmware-specific overrides
    pub fn with_classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Snapshot of the current attempt record
    pub async fn attempt(&self) -> ProvisioningAttempt {
        self.attempt.read().await.clone()
    }

    pub fn mode(&self) -> &SessionMode {
        &self.mode
    }

    /// Begin continuous discovery
    ///
    /// Fails closed with [`ProvisionError::AvailabilityDenied`] while the
    /// radio is disabled; the caller prompts the user and retries.
    pub async fn start(&self) -> ProvisionOpResult<()> {
        if !self.transport.is_available().await {
            return Err(ProvisionError::AvailabilityDenied);
        }
        self.stop_discovery_task().await?;
        self.cancel_tx.send_replace(false);

        let mut events = self.transport.start_discovery().await?;
        let attempt = self.attempt.clone();
        let task = tokio::spawn(async move {
            while let Some(device) = events.recv().await {
                attempt.write().await.upsert_candidate(device);
            }
            debug!("Discovery event feed ended");
        });
        *self.discovery_task.lock().await = Some(task);
        info!("Discovery started");
        Ok(())
    }

    /// Select a discovered candidate and connect to it
    ///
    /// Stops discovery first (the radio is shared), closes any prior session,
    /// then opens the link, performs the setup-key exchange, and reads device
    /// info. Connection failures are classified and land in `error`.
    pub async fn select_device(&self, identity: &str) -> ProvisionOpResult<()> {
        let candidate = {
            let attempt = self.attempt.read().await;
            match attempt.step() {
                Step::Scanning | Step::Selecting => {}
                step => return Err(ProvisionError::InvalidStep { step }),
            }
            attempt
                .candidates()
                .iter()
                .find(|c| c.identity == identity)
                .cloned()
                .ok_or_else(|| ProvisionError::UnknownDevice(identity.to_string()))?
        };

        self.stop_discovery_task().await?;
        self.close_session().await;

        self.attempt.write().await.select(candidate.clone());
        self.connect_flow(&candidate).await
    }

    /// Relay a Wi-Fi scan from the appliance; valid while `configuring`
    ///
    /// The result replaces the attempt's network list and does not change the
    /// step.
    pub async fn request_wifi_scan(&self) -> ProvisionOpResult<()> {
        self.require_step(Step::Configuring).await?;
        let session = self.ready_session().await?;

        let cancel = self.cancel_tx.subscribe();
        let networks = tokio::select! {
            biased;
            () = await_cancel(cancel) => return Err(ProvisionError::Cancelled),
            result = self.relay.relay(session.as_ref()) => result?,
        };
        self.attempt.write().await.set_networks(networks);
        Ok(())
    }

    /// Submit Wi-Fi credentials and observe until a terminal status
    pub async fn provision_wifi(&self, ssid: &str, passphrase: &str) -> ProvisionOpResult<()> {
        if ssid.trim().is_empty() {
            return Err(ProvisionError::LocalValidation(
                "SSID must not be empty".into(),
            ));
        }
        {
            let attempt = self.attempt.read().await;
            if attempt.step() != Step::Configuring {
                return Err(ProvisionError::InvalidStep {
                    step: attempt.step(),
                });
            }
            if let Some(info) = attempt.device_info() {
                if info.class == HardwareClass::Crate {
                    return Err(ProvisionError::LocalValidation(
                        "appliance joins over Thread; submit a peer dataset instead".into(),
                    ));
                }
            }
        }

        let session = self.ready_session().await?;
        self.attempt.write().await.note_wifi_submission(ssid);

        let credentials = Credentials::Wifi {
            ssid: ssid.to_string(),
            passphrase: passphrase.to_string(),
        };
        let statuses = match self.provisioner.submit(session.as_ref(), credentials).await {
            Ok(statuses) => statuses,
            Err(e) => return self.submission_setup_failed(e).await,
        };
        self.drive_submission(statuses).await
    }

    /// Submit the Thread dataset of an online peer Hub
    ///
    /// Rejected locally, with no transport call and no step change, when the
    /// peer is offline or holds no dataset.
    pub async fn provision_thread(&self, peer: &ApplianceId) -> ProvisionOpResult<()> {
        {
            let attempt = self.attempt.read().await;
            if attempt.step() != Step::Configuring {
                return Err(ProvisionError::InvalidStep {
                    step: attempt.step(),
                });
            }
            if let Some(info) = attempt.device_info() {
                if info.class == HardwareClass::Hub {
                    return Err(ProvisionError::LocalValidation(
                        "appliance takes Wi-Fi credentials directly".into(),
                    ));
                }
            }
        }

        let dataset = match self.registry.thread_dataset(peer).await {
            Ok(Some(dataset)) => dataset,
            Ok(None) => {
                return Err(ProvisionError::LocalValidation(format!(
                    "peer {peer} holds no Thread dataset"
                )));
            }
            Err(RegistryError::PeerOffline(peer)) => {
                return Err(ProvisionError::LocalValidation(format!(
                    "peer {peer} is offline"
                )));
            }
            Err(e) => return Err(e.into()),
        };

        let session = self.ready_session().await?;
        self.attempt
            .write()
            .await
            .note_thread_submission(dataset.clone());

        let statuses = match self
            .provisioner
            .submit(session.as_ref(), Credentials::Thread { dataset })
            .await
        {
            Ok(statuses) => statuses,
            Err(e) => return self.submission_setup_failed(e).await,
        };
        self.drive_submission(statuses).await
    }

    /// Re-enter the step whose action failed, keeping submitted input
    ///
    /// A failed connection is re-attempted here; a failed credential
    /// submission returns to `configuring` with the SSID and dataset still
    /// populated so the caller can prefill input fields.
    pub async fn retry(&self) -> ProvisionOpResult<()> {
        let origin = {
            let mut attempt = self.attempt.write().await;
            if attempt.step() != Step::Error {
                return Err(ProvisionError::InvalidStep {
                    step: attempt.step(),
                });
            }
            attempt.clear_for_retry()
        };

        match origin {
            Some(Step::Connecting) => {
                let candidate = self
                    .attempt
                    .read()
                    .await
                    .selected()
                    .cloned()
                    .ok_or_else(|| {
                        ProvisionError::LocalValidation("no device selected".into())
                    })?;
                self.close_session().await;
                self.connect_flow(&candidate).await
            }
            _ => Ok(()),
        }
    }

    /// Tear the session down and clear the attempt
    ///
    /// Safe concurrently with in-flight operations; they observe the
    /// cancellation flag and fail with [`ProvisionError::Cancelled`], which is
    /// never surfaced as a user-facing fault. The appliance may already be
    /// mid-apply; its own state is outside host control.
    pub async fn cancel(&self) -> ProvisionOpResult<()> {
        {
            let step = self.attempt.read().await.step();
            if step == Step::Complete {
                return Err(ProvisionError::InvalidStep { step });
            }
        }
        info!("Cancelling provisioning session");
        self.cancel_tx.send_replace(true);
        self.stop_discovery_task().await?;
        self.close_session().await;
        self.attempt.write().await.reset();
        Ok(())
    }

    /// Alias for [`ProvisioningMachine::cancel`]
    pub async fn reset(&self) -> ProvisionOpResult<()> {
        self.cancel().await
    }

    /// Store a name for persistence time; valid in `configuring` and `complete`
    pub async fn set_custom_device_name(&self, name: &str) -> ProvisionOpResult<()> {
        let mut attempt = self.attempt.write().await;
        match attempt.step() {
            Step::Configuring | Step::Complete => {
                attempt.set_custom_name(name.to_string());
                Ok(())
            }
            step => Err(ProvisionError::InvalidStep { step }),
        }
    }

    /// Build the outcome handed to the persistence collaborator
    ///
    /// Contains the network identity and the opaque consumer output; never the
    /// passphrase.
    pub async fn result(&self) -> ProvisionOpResult<ProvisionResult> {
        let attempt = self.attempt.read().await;
        if !attempt.is_success() {
            return Err(ProvisionError::InvalidStep {
                step: attempt.step(),
            });
        }
        let info = attempt
            .device_info()
            .ok_or_else(|| ProvisionError::Protocol("device info missing".into()))?;

        let network = if let Some(ssid) = attempt.ssid() {
            NetworkIdentity::Wifi {
                ssid: ssid.to_string(),
            }
        } else if let Some(dataset) = attempt.dataset() {
            NetworkIdentity::Thread {
                dataset_reference: dataset.reference.clone(),
            }
        } else {
            return Err(ProvisionError::Protocol(
                "no network identity recorded".into(),
            ));
        };

        let name = attempt
            .custom_name()
            .map(str::to_string)
            .or_else(|| attempt.selected().map(|c| c.name.clone()))
            .unwrap_or_else(|| info.serial.clone());

        Ok(ProvisionResult {
            serial: info.serial.clone(),
            name,
            network,
            consumer_output: attempt.consumer_output().map(<[u8]>::to_vec).unwrap_or_default(),
        })
    }

    /// Persist the outcome: claim on first-time setup, update in both modes
    pub async fn persist(&self, user: &str) -> ProvisionOpResult<ApplianceId> {
        let result = self.result().await?;
        let appliance = match &self.mode {
            SessionMode::Initial => self.registry.claim_appliance(&result.serial).await?.id,
            SessionMode::Reprovision { appliance } => appliance.clone(),
        };
        self.registry
            .update_provisioning(&appliance, user, &result.name, &result)
            .await?;
        info!("Provisioning stored for appliance {appliance}");
        Ok(appliance)
    }

    async fn connect_flow(&self, candidate: &DiscoveredDevice) -> ProvisionOpResult<()> {
        info!("Connecting to '{}'", candidate.name);

        let cancel = self.cancel_tx.subscribe();
        let result = tokio::select! {
            biased;
            () = await_cancel(cancel) => {
                self.close_session().await;
                return Err(ProvisionError::Cancelled);
            }
            result = self.establish(candidate) => result,
            () = sleep(self.settings.connect_timeout) => Err(TransportError::Timeout.into()),
        };

        match result {
            Ok(()) => Ok(()),
            Err(ProvisionError::Transport(e)) => {
                warn!("Connection failed: {e}");
                self.close_session().await;
                let kind = self.classifier.classify_transport(&e);
                self.attempt
                    .write()
                    .await
                    .fail(self.classifier.fault(kind, Step::Connecting));
                Ok(())
            }
            Err(ProvisionError::Protocol(message)) => {
                warn!("Device info unreadable: {message}");
                self.close_session().await;
                self.attempt
                    .write()
                    .await
                    .fail(self.classifier.fault(ErrorKind::Unknown, Step::Connecting));
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn establish(&self, candidate: &DiscoveredDevice) -> ProvisionOpResult<()> {
        let session = Arc::new(self.transport.connect(candidate).await?);
        *self.session.write().await = Some(session.clone());

        // Serial first: the setup-key proof is derived from it.
        let serial = decode_utf8(session.read(Attribute::SerialNumber).await?, "serial")?;
        session
            .write(Attribute::SetupKey, &setup_key(&serial))
            .await?;

        let class = session.read(Attribute::HardwareClass).await?;
        let firmware = session.read(Attribute::FirmwareVersion).await?;
        let info = decode_device_info(serial.into_bytes(), class, firmware)?;
        info!(
            "Link ready: {} ({:?}, firmware {})",
            info.serial, info.class, info.firmware_version
        );

        self.attempt.write().await.connected(info);
        Ok(())
    }

    async fn drive_submission(
        &self,
        mut statuses: mpsc::Receiver<ProvisioningStatus>,
    ) -> ProvisionOpResult<()> {
        let cancel = self.cancel_tx.subscribe();
        let terminal = loop {
            let status = tokio::select! {
                biased;
                () = await_cancel(cancel.clone()) => return Err(ProvisionError::Cancelled),
                status = statuses.recv() => status,
            };
            match status {
                Some(status) => {
                    self.attempt.write().await.set_status(status);
                    if status.is_terminal() {
                        break status;
                    }
                }
                // The provisioner always ends with a terminal; a bare close
                // is treated as expiry anyway.
                None => break ProvisioningStatus::TimedOut,
            }
        };
        self.finish_submission(terminal).await
    }

    async fn finish_submission(&self, terminal: ProvisioningStatus) -> ProvisionOpResult<()> {
        match terminal {
            ProvisioningStatus::Ready => {
                let output = match self.ready_session().await {
                    Ok(session) => match session.read(Attribute::ConsumerOutput).await {
                        Ok(bytes) => bytes,
                        Err(e) => {
                            warn!("Consumer output unavailable: {e}");
                            Vec::new()
                        }
                    },
                    Err(_) => Vec::new(),
                };
                let mut attempt = self.attempt.write().await;
                attempt.set_status(ProvisioningStatus::Ready);
                attempt.complete(output);
                info!("Provisioning complete");
            }
            ProvisioningStatus::Failed(reason) => {
                let kind = self.classifier.classify_reason(reason);
                warn!("Appliance reported failure; classified as {kind}");
                let mut attempt = self.attempt.write().await;
                attempt.set_status(terminal);
                attempt.fail(self.classifier.fault(kind, Step::Configuring));
            }
            ProvisioningStatus::TimedOut => {
                warn!("No terminal status observed within the window");
                let mut attempt = self.attempt.write().await;
                attempt.set_status(terminal);
                attempt
                    .fail(self.classifier.fault(ErrorKind::Timeout, Step::Configuring));
            }
            other => debug!("Ignoring non-terminal {other:?}"),
        }
        Ok(())
    }

    async fn submission_setup_failed(&self, error: ProvisionError) -> ProvisionOpResult<()> {
        match error {
            ProvisionError::Transport(e) => {
                if *self.cancel_tx.subscribe().borrow() {
                    return Err(ProvisionError::Cancelled);
                }
                let kind = self.classifier.classify_transport(&e);
                self.attempt
                    .write()
                    .await
                    .fail(self.classifier.fault(kind, Step::Configuring));
                Ok(())
            }
            other => Err(other),
        }
    }

    async fn require_step(&self, expected: Step) -> ProvisionOpResult<()> {
        let step = self.attempt.read().await.step();
        if step == expected {
            Ok(())
        } else {
            Err(ProvisionError::InvalidStep { step })
        }
    }

    async fn ready_session(&self) -> ProvisionOpResult<Arc<T::Session>> {
        let session = self
            .session
            .read()
            .await
            .clone()
            .ok_or(TransportError::SessionClosed)?;
        if session.state().await != SessionState::Ready {
            return Err(TransportError::SessionClosed.into());
        }
        Ok(session)
    }

    async fn close_session(&self) {
        if let Some(session) = self.session.write().await.take() {
            if let Err(e) = session.close().await {
                warn!("Session close reported: {e}");
            }
        }
    }

    async fn stop_discovery_task(&self) -> ProvisionOpResult<()> {
        if let Some(task) = self.discovery_task.lock().await.take() {
            task.abort();
            self.transport.stop_discovery().await?;
        }
        Ok(())
    }
}
