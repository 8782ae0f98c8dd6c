//! Session-wide provisioning attempt record
//!
//! One attempt exists per provisioning session and is owned by the state
//! machine; all mutation goes through the methods here. Retry preserves the
//! submitted SSID and Thread dataset so callers can prefill input fields;
//! reset clears everything.

use crate::core::error::ProvisioningFault;
use crate::core::types::{
    DeviceInfo, DiscoveredDevice, ProvisioningStatus, Step, ThreadDataset, WifiNetwork,
};

#[derive(Debug, Clone, Default)]
pub struct ProvisioningAttempt {
    step: Step,
    candidates: Vec<DiscoveredDevice>,
    selected: Option<DiscoveredDevice>,
    device_info: Option<DeviceInfo>,
    networks: Option<Vec<WifiNetwork>>,
    ssid: Option<String>,
    dataset: Option<ThreadDataset>,
    status: Option<ProvisioningStatus>,
    fault: Option<ProvisioningFault>,
    consumer_output: Option<Vec<u8>>,
    custom_name: Option<String>,
}

impl ProvisioningAttempt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn candidates(&self) -> &[DiscoveredDevice] {
        &self.candidates
    }

    pub fn selected(&self) -> Option<&DiscoveredDevice> {
        self.selected.as_ref()
    }

    pub fn device_info(&self) -> Option<&DeviceInfo> {
        self.device_info.as_ref()
    }

    pub fn networks(&self) -> Option<&[WifiNetwork]> {
        self.networks.as_deref()
    }

    pub fn ssid(&self) -> Option<&str> {
        self.ssid.as_deref()
    }

    pub fn dataset(&self) -> Option<&ThreadDataset> {
        self.dataset.as_ref()
    }

    pub fn status(&self) -> Option<ProvisioningStatus> {
        self.status
    }

    pub fn fault(&self) -> Option<&ProvisioningFault> {
        self.fault.as_ref()
    }

    pub fn consumer_output(&self) -> Option<&[u8]> {
        self.consumer_output.as_deref()
    }

    pub fn custom_name(&self) -> Option<&str> {
        self.custom_name.as_deref()
    }

    /// Derived: a session is held and device info has been read
    pub fn is_connected(&self) -> bool {
        matches!(self.step, Step::Configuring | Step::Complete)
    }

    /// Derived: frozen once the machine reaches `complete`
    pub fn is_success(&self) -> bool {
        self.step == Step::Complete
    }

    /// Merge a discovery event into the candidate list
    ///
    /// The identity token is the dedup key; a repeated advertisement replaces
    /// the earlier entry, so the most recent signal strength wins.
    pub(crate) fn upsert_candidate(&mut self, device: DiscoveredDevice) {
        match self
            .candidates
            .iter_mut()
            .find(|c| c.identity == device.identity)
        {
            Some(existing) => *existing = device,
            None => self.candidates.push(device),
        }
        if self.step == Step::Scanning {
            self.step = Step::Selecting;
        }
    }

    pub(crate) fn select(&mut self, device: DiscoveredDevice) {
        self.selected = Some(device);
        self.step = Step::Connecting;
    }

    pub(crate) fn connected(&mut self, info: DeviceInfo) {
        self.device_info = Some(info);
        self.step = Step::Configuring;
    }

    /// Replace the relayed network list; never deduplicated
    pub(crate) fn set_networks(&mut self, networks: Vec<WifiNetwork>) {
        self.networks = Some(networks);
    }

    pub(crate) fn note_wifi_submission(&mut self, ssid: &str) {
        self.ssid = Some(ssid.to_string());
    }

    pub(crate) fn note_thread_submission(&mut self, dataset: ThreadDataset) {
        self.dataset = Some(dataset);
    }

    pub(crate) fn set_status(&mut self, status: ProvisioningStatus) {
        self.status = Some(status);
    }

    pub(crate) fn complete(&mut self, consumer_output: Vec<u8>) {
        self.consumer_output = Some(consumer_output);
        self.step = Step::Complete;
    }

    pub(crate) fn fail(&mut self, fault: ProvisioningFault) {
        self.fault = Some(fault);
        self.step = Step::Error;
    }

    /// Clear only the error fields and re-enter the origin step
    ///
    /// SSID, dataset, device info, and the network list stay populated.
    pub(crate) fn clear_for_retry(&mut self) -> Option<Step> {
        let origin = self.fault.take()?.origin;
        self.status = None;
        self.step = origin;
        Some(origin)
    }

    pub(crate) fn set_custom_name(&mut self, name: String) {
        self.custom_name = Some(name);
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use pretty_assertions::assert_eq;

    fn device(identity: &str, rssi: i16) -> DiscoveredDevice {
        DiscoveredDevice {
            identity: identity.into(),
            name: format!("Appliance {identity}"),
            rssi: Some(rssi),
            class_hint: None,
        }
    }

    #[test]
    fn test_new_attempt_is_scanning_and_empty() {
        let attempt = ProvisioningAttempt::new();
        assert_eq!(attempt.step(), Step::Scanning);
        assert!(attempt.candidates().is_empty());
        assert!(!attempt.is_connected());
        assert!(!attempt.is_success());
    }

    #[test]
    fn test_first_candidate_moves_to_selecting() {
        let mut attempt = ProvisioningAttempt::new();
        attempt.upsert_candidate(device("HUB-1", -45));
        assert_eq!(attempt.step(), Step::Selecting);
        assert_eq!(attempt.candidates().len(), 1);
    }

    #[test]
    fn test_duplicate_advertisement_latest_rssi_wins() {
        let mut attempt = ProvisioningAttempt::new();
        attempt.upsert_candidate(device("HUB-1", -45));
        attempt.upsert_candidate(device("HUB-2", -80));
        attempt.upsert_candidate(device("HUB-1", -60));

        assert_eq!(attempt.candidates().len(), 2);
        assert_eq!(attempt.candidates()[0].rssi, Some(-60));
    }

    #[test]
    fn test_dedup_key_is_identity_not_name() {
        let mut attempt = ProvisioningAttempt::new();
        attempt.upsert_candidate(device("HUB-1", -45));

        let renamed = DiscoveredDevice {
            name: "Renamed".into(),
            ..device("HUB-1", -50)
        };
        attempt.upsert_candidate(renamed);
        assert_eq!(attempt.candidates().len(), 1);
        assert_eq!(attempt.candidates()[0].name, "Renamed");
    }

    #[test]
    fn test_retry_preserves_ssid_and_dataset() {
        let mut attempt = ProvisioningAttempt::new();
        attempt.note_wifi_submission("HomeNet");
        attempt.note_thread_submission(ThreadDataset {
            reference: "ds-1".into(),
            payload: vec![1, 2, 3],
        });
        attempt.fail(ProvisioningFault::new(ErrorKind::AuthFailed, Step::Configuring));
        assert_eq!(attempt.step(), Step::Error);

        let origin = attempt.clear_for_retry();
        assert_eq!(origin, Some(Step::Configuring));
        assert_eq!(attempt.step(), Step::Configuring);
        assert!(attempt.fault().is_none());
        assert!(attempt.status().is_none());
        assert_eq!(attempt.ssid(), Some("HomeNet"));
        assert_eq!(attempt.dataset().unwrap().reference, "ds-1");
    }

    #[test]
    fn test_retry_without_fault_is_a_no_op() {
        let mut attempt = ProvisioningAttempt::new();
        assert_eq!(attempt.clear_for_retry(), None);
        assert_eq!(attempt.step(), Step::Scanning);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut attempt = ProvisioningAttempt::new();
        attempt.upsert_candidate(device("HUB-1", -45));
        attempt.note_wifi_submission("HomeNet");
        attempt.set_custom_name("Kitchen".into());
        attempt.fail(ProvisioningFault::new(ErrorKind::Unknown, Step::Connecting));

        attempt.reset();
        assert_eq!(attempt.step(), Step::Scanning);
        assert!(attempt.candidates().is_empty());
        assert!(attempt.ssid().is_none());
        assert!(attempt.custom_name().is_none());
        assert!(attempt.fault().is_none());
    }

    #[test]
    fn test_complete_freezes_success() {
        let mut attempt = ProvisioningAttempt::new();
        attempt.set_status(ProvisioningStatus::Ready);
        attempt.complete(vec![0xaa]);
        assert!(attempt.is_success());
        assert!(attempt.is_connected());
        assert_eq!(attempt.consumer_output(), Some(&[0xaa][..]));
    }
}
