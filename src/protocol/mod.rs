//! Wire protocol between the host and the appliance's provisioning service

pub mod status;
pub mod wire;

pub use {
    status::decode_status,
    wire::{
        APPLY_THREAD, APPLY_WIFI, MAX_CHUNK_SIZE, SCAN_START, chunk_payload, decode_device_info,
        decode_scan_results, setup_key,
    },
};
