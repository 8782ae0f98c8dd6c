//! Bluetooth Low Energy transport layer

pub mod central;
pub mod uuids;

pub use {
    central::{BleApplianceSession, BleTransport},
    uuids::*,
};
