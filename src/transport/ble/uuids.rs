//! GATT UUIDs of the appliance provisioning service

use uuid::Uuid;

use crate::transport::link::Attribute;

/// Provisioning service UUID advertised by Hubs and Crates
pub const PROVISIONING_SERVICE_UUID: Uuid = Uuid::from_bytes([
    0x9b, 0x4e, 0x51, 0xc2, 0x0a, 0x77, 0x4f, 0x1a, 0x9d, 0x3e, 0x6b, 0x02, 0x8e, 0x5a, 0x71, 0x01,
]);

/// Setup-key write characteristic (32-byte SHA3 hash of the serial)
pub const SETUP_KEY_CHAR_UUID: Uuid = Uuid::from_bytes([
    0x9b, 0x4e, 0x51, 0xc2, 0x0a, 0x77, 0x4f, 0x1a, 0x9d, 0x3e, 0x6b, 0x02, 0x8e, 0x5a, 0x71, 0x10,
]);

/// Serial number read characteristic (UTF-8)
pub const SERIAL_NUMBER_CHAR_UUID: Uuid = Uuid::from_bytes([
    0x9b, 0x4e, 0x51, 0xc2, 0x0a, 0x77, 0x4f, 0x1a, 0x9d, 0x3e, 0x6b, 0x02, 0x8e, 0x5a, 0x71, 0x11,
]);

/// Hardware class read characteristic (1 byte)
pub const HARDWARE_CLASS_CHAR_UUID: Uuid = Uuid::from_bytes([
    0x9b, 0x4e, 0x51, 0xc2, 0x0a, 0x77, 0x4f, 0x1a, 0x9d, 0x3e, 0x6b, 0x02, 0x8e, 0x5a, 0x71, 0x12,
]);

/// Firmware version read characteristic (UTF-8)
pub const FIRMWARE_VERSION_CHAR_UUID: Uuid = Uuid::from_bytes([
    0x9b, 0x4e, 0x51, 0xc2, 0x0a, 0x77, 0x4f, 0x1a, 0x9d, 0x3e, 0x6b, 0x02, 0x8e, 0x5a, 0x71, 0x13,
]);

/// Wi-Fi scan control characteristic (write to start)
pub const WIFI_SCAN_CONTROL_CHAR_UUID: Uuid = Uuid::from_bytes([
    0x9b, 0x4e, 0x51, 0xc2, 0x0a, 0x77, 0x4f, 0x1a, 0x9d, 0x3e, 0x6b, 0x02, 0x8e, 0x5a, 0x71, 0x20,
]);

/// Wi-Fi scan results characteristic (read in 100-byte chunks)
pub const WIFI_SCAN_RESULTS_CHAR_UUID: Uuid = Uuid::from_bytes([
    0x9b, 0x4e, 0x51, 0xc2, 0x0a, 0x77, 0x4f, 0x1a, 0x9d, 0x3e, 0x6b, 0x02, 0x8e, 0x5a, 0x71, 0x21,
]);

/// SSID write characteristic (accumulates partial writes)
pub const WIFI_SSID_CHAR_UUID: Uuid = Uuid::from_bytes([
    0x9b, 0x4e, 0x51, 0xc2, 0x0a, 0x77, 0x4f, 0x1a, 0x9d, 0x3e, 0x6b, 0x02, 0x8e, 0x5a, 0x71, 0x30,
]);

/// Passphrase write characteristic
pub const WIFI_PASSPHRASE_CHAR_UUID: Uuid = Uuid::from_bytes([
    0x9b, 0x4e, 0x51, 0xc2, 0x0a, 0x77, 0x4f, 0x1a, 0x9d, 0x3e, 0x6b, 0x02, 0x8e, 0x5a, 0x71, 0x31,
]);

/// Thread dataset write characteristic
pub const THREAD_DATASET_CHAR_UUID: Uuid = Uuid::from_bytes([
    0x9b, 0x4e, 0x51, 0xc2, 0x0a, 0x77, 0x4f, 0x1a, 0x9d, 0x3e, 0x6b, 0x02, 0x8e, 0x5a, 0x71, 0x32,
]);

/// Provision control characteristic (write to apply credentials)
pub const PROVISION_CONTROL_CHAR_UUID: Uuid = Uuid::from_bytes([
    0x9b, 0x4e, 0x51, 0xc2, 0x0a, 0x77, 0x4f, 0x1a, 0x9d, 0x3e, 0x6b, 0x02, 0x8e, 0x5a, 0x71, 0x33,
]);

/// Provisioning status characteristic (notify)
pub const PROVISION_STATUS_CHAR_UUID: Uuid = Uuid::from_bytes([
    0x9b, 0x4e, 0x51, 0xc2, 0x0a, 0x77, 0x4f, 0x1a, 0x9d, 0x3e, 0x6b, 0x02, 0x8e, 0x5a, 0x71, 0x34,
]);

/// Consumer output read characteristic (opaque bytes)
pub const CONSUMER_OUTPUT_CHAR_UUID: Uuid = Uuid::from_bytes([
    0x9b, 0x4e, 0x51, 0xc2, 0x0a, 0x77, 0x4f, 0x1a, 0x9d, 0x3e, 0x6b, 0x02, 0x8e, 0x5a, 0x71, 0x40,
]);

/// Manufacturer data company identifier carrying the hardware-class hint
pub const MANUFACTURER_ID: u16 = 0x0a55;

/// Map a provisioning attribute to its characteristic UUID
pub fn attribute_uuid(attribute: Attribute) -> Uuid {
    match attribute {
        Attribute::SetupKey => SETUP_KEY_CHAR_UUID,
        Attribute::SerialNumber => SERIAL_NUMBER_CHAR_UUID,
        Attribute::HardwareClass => HARDWARE_CLASS_CHAR_UUID,
        Attribute::FirmwareVersion => FIRMWARE_VERSION_CHAR_UUID,
        Attribute::WifiScanControl => WIFI_SCAN_CONTROL_CHAR_UUID,
        Attribute::WifiScanResults => WIFI_SCAN_RESULTS_CHAR_UUID,
        Attribute::WifiSsid => WIFI_SSID_CHAR_UUID,
        Attribute::WifiPassphrase => WIFI_PASSPHRASE_CHAR_UUID,
        Attribute::ThreadDataset => THREAD_DATASET_CHAR_UUID,
        Attribute::ProvisionControl => PROVISION_CONTROL_CHAR_UUID,
        Attribute::ProvisionStatus => PROVISION_STATUS_CHAR_UUID,
        Attribute::ConsumerOutput => CONSUMER_OUTPUT_CHAR_UUID,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_uuid_format() {
        assert_eq!(
            PROVISIONING_SERVICE_UUID.to_string(),
            "9b4e51c2-0a77-4f1a-9d3e-6b028e5a7101"
        );
    }

    #[test]
    fn test_attribute_uuids_unique() {
        let attributes = [
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
        ];

        for (i, a) in attributes.iter().enumerate() {
            for (j, b) in attributes.iter().enumerate() {
                if i != j {
                    assert_ne!(
                        attribute_uuid(*a),
                        attribute_uuid(*b),
                        "attributes {a} and {b} share a UUID"
                    );
                }
            }
        }
    }
}
