//! Runtime settings

use std::time::Duration;

use crate::config::CliArgs;

/// Timeout and polling configuration for a provisioning session
///
/// Windows vary with the embedded peer's protocol revision, so they are
/// configuration rather than constants.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Window for connection establishment plus device-info read
    pub connect_timeout: Duration,
    /// Window for one credential submission to reach a terminal status
    pub submit_timeout: Duration,
    /// Window for the appliance-side Wi-Fi scan relay
    pub scan_relay_timeout: Duration,
    /// Poll interval while waiting for relayed scan results
    pub scan_relay_poll: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            connect_timeout: Duration::from_secs(20),
            submit_timeout: Duration::from_secs(60),
            scan_relay_timeout: Duration::from_secs(15),
            scan_relay_poll: Duration::from_millis(500),
        }
    }
}

impl From<&CliArgs> for Settings {
    fn from(args: &CliArgs) -> Self {
        Settings {
            connect_timeout: Duration::from_secs(args.connect_timeout),
            submit_timeout: Duration::from_secs(args.submit_timeout),
            scan_relay_timeout: Duration::from_secs(args.scan_relay_timeout),
            ..Settings::default()
        }
    }
}
