//! Command-line argument parsing

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[clap(name = "appliance-provisioner", version)]
#[clap(about = "Provision Hub and Crate appliances over BLE")]
pub struct CliArgs {
    /// Substring of the advertised name or address to select; strongest
    /// signal wins among matches
    #[clap(short = 'd', long)]
    pub device: Option<String>,

    /// Seconds to collect discovery results before selecting
    #[clap(long, default_value = "8")]
    pub scan_seconds: u64,

    /// SSID to provision (Hub appliances)
    #[clap(long)]
    pub ssid: Option<String>,

    /// Passphrase for the target network
    #[clap(long)]
    pub password: Option<String>,

    /// Appliance id of an online peer Hub providing the Thread dataset
    /// (Crate appliances)
    #[clap(long)]
    pub thread_peer: Option<String>,

    /// Name to store against the device record
    #[clap(short = 'n', long)]
    pub name: Option<String>,

    /// Account the appliance is provisioned for
    #[clap(long, default_value = "local-user")]
    pub user: String,

    /// Reprovision this known appliance id instead of claiming a new one
    #[clap(long)]
    pub reprovision: Option<String>,

    /// Connection establishment timeout in seconds
    #[clap(long, default_value = "20")]
    pub connect_timeout: u64,

    /// Credential submission timeout in seconds
    #[clap(long, default_value = "60")]
    pub submit_timeout: u64,

    /// Wi-Fi scan relay timeout in seconds
    #[clap(long, default_value = "15")]
    pub scan_relay_timeout: u64,

    /// Relay a Wi-Fi scan and print the visible networks before provisioning
    #[clap(long)]
    pub list_networks: bool,
}
