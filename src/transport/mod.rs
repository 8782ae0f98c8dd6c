//! Transport abstraction layer

pub mod ble;
pub mod link;
pub mod mock;

pub use link::{ApplianceSession, Attribute, SessionState, Transport};

#[cfg(test)]
pub use mock::{MockSession, MockTransport};
