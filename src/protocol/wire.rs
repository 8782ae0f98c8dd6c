//! Payload codecs for the provisioning service attributes

use sha3::{Digest, Sha3_256};

use crate::core::{
    error::ProvisionError,
    types::{DeviceInfo, HardwareClass, WifiNetwork},
};

/// Maximum attribute chunk size for reads and writes
pub const MAX_CHUNK_SIZE: usize = 100;

/// Control codes for the Wi-Fi scan characteristic
pub const SCAN_START: u8 = 1;

/// Control codes for the provision characteristic
pub const APPLY_WIFI: u8 = 1;
pub const APPLY_THREAD: u8 = 2;

/// Compute the setup-key proof written after connecting
///
/// The appliance accepts SHA3-256 of its own serial as proof of physical
/// possession; the serial is printed on the unit.
pub fn setup_key(serial: &str) -> [u8; 32] {
    let mut hasher = Sha3_256::new();
    hasher.update(serial.as_bytes());
    hasher.finalize().into()
}

/// Split a payload into attribute-sized write chunks
///
/// An empty payload still produces one empty chunk so the appliance observes
/// the write.
pub fn chunk_payload(payload: &[u8]) -> Vec<Vec<u8>> {
    if payload.is_empty() {
        return vec![Vec::new()];
    }
    payload.chunks(MAX_CHUNK_SIZE).map(<[u8]>::to_vec).collect()
}

/// Decode a UTF-8 attribute value (serial, firmware version)
pub fn decode_utf8(value: Vec<u8>, attribute: &str) -> Result<String, ProvisionError> {
    String::from_utf8(value)
        .map_err(|e| ProvisionError::Protocol(format!("invalid UTF-8 in {attribute}: {e}")))
}

/// Decode the hardware class byte
pub fn decode_hardware_class(value: &[u8]) -> Result<HardwareClass, ProvisionError> {
    let byte = value
        .first()
        .copied()
        .ok_or_else(|| ProvisionError::Protocol("empty hardware class value".into()))?;
    HardwareClass::try_from(byte)
        .map_err(|()| ProvisionError::Protocol(format!("unknown hardware class {byte}")))
}

/// Assemble device info from its three attribute values
pub fn decode_device_info(
    serial: Vec<u8>,
    class: Vec<u8>,
    firmware: Vec<u8>,
) -> Result<DeviceInfo, ProvisionError> {
    Ok(DeviceInfo {
        serial: decode_utf8(serial, "serial")?,
        class: decode_hardware_class(&class)?,
        firmware_version: decode_utf8(firmware, "firmware version")?,
    })
}

/// Parse the relayed Wi-Fi scan result payload
///
/// The payload is a JSON array produced by the appliance. Order is preserved
/// and duplicates are kept; two networks may share an SSID with different
/// security.
pub fn decode_scan_results(payload: &[u8]) -> Result<Vec<WifiNetwork>, ProvisionError> {
    if payload.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_slice(payload)
        .map_err(|e| ProvisionError::Protocol(format!("invalid scan result payload: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_setup_key_is_sha3_of_serial() {
        let key = setup_key("HUB-1");

        let mut hasher = Sha3_256::new();
        hasher.update(b"HUB-1");
        let expected: [u8; 32] = hasher.finalize().into();

        assert_eq!(key, expected);
        assert_ne!(setup_key("HUB-1"), setup_key("HUB-2"));
    }

    #[test]
    fn test_chunk_payload_boundaries() {
        let exact = vec![0u8; MAX_CHUNK_SIZE];
        assert_eq!(chunk_payload(&exact).len(), 1);

        let over = vec![0u8; MAX_CHUNK_SIZE + 1];
        let chunks = chunk_payload(&over);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), MAX_CHUNK_SIZE);
        assert_eq!(chunks[1].len(), 1);

        assert_eq!(chunk_payload(&[]), vec![Vec::<u8>::new()]);
    }

    #[test]
    fn test_chunk_payload_preserves_content() {
        let payload: Vec<u8> = (0..=255).collect();
        let rejoined: Vec<u8> = chunk_payload(&payload).concat();
        assert_eq!(rejoined, payload);
    }

    #[test]
    fn test_decode_device_info() {
        let info = decode_device_info(b"CRT-42".to_vec(), vec![2], b"1.4.0".to_vec()).unwrap();
        assert_eq!(info.serial, "CRT-42");
        assert_eq!(info.class, HardwareClass::Crate);
        assert_eq!(info.firmware_version, "1.4.0");
    }

    #[test]
    fn test_decode_device_info_rejects_bad_class() {
        assert!(decode_device_info(b"X".to_vec(), vec![9], b"1.0".to_vec()).is_err());
        assert!(decode_device_info(b"X".to_vec(), vec![], b"1.0".to_vec()).is_err());
    }

    #[test]
    fn test_decode_device_info_rejects_invalid_utf8() {
        assert!(decode_device_info(vec![0xff, 0xfe], vec![1], b"1.0".to_vec()).is_err());
    }

    #[test]
    fn test_decode_scan_results() {
        let payload = br#"[{"ssid":"HomeNet","secured":true,"rssi":-50},{"ssid":"HomeNet","secured":false,"rssi":-71}]"#;
        let networks = decode_scan_results(payload).unwrap();
        assert_eq!(networks.len(), 2);
        // Same SSID twice with different security stays two entries.
        assert_eq!(networks[0].ssid, networks[1].ssid);
        assert_ne!(networks[0].secured, networks[1].secured);
    }

    #[test]
    fn test_decode_scan_results_empty_payload() {
        assert_eq!(decode_scan_results(&[]).unwrap(), Vec::new());
    }

    #[test]
    fn test_decode_scan_results_invalid_json() {
        assert!(decode_scan_results(b"{not json").is_err());
    }
}
