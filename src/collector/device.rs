//! Router collectors.
//!
//! - [`DeviceCollector`]: identity, uptime, reboot count and host table
//! - [`PortMappingCollector`]: NAT port-mapping table
//! - [`WifiCollector`]: per-radio signal strength and channel
//!
//! All three talk to the router through the [`DeviceClient`] capability and
//! each keeps its own login session.

mod client;
mod collector;
mod config;
mod fields;
mod port_mapping;
mod session;
#[cfg(test)]
pub(crate) mod testing;
mod wifi;

pub use client::{DeviceClient, DeviceError, DeviceInfo, Host, Session};
pub use collector::{
    CONNECTED_DEVICES_FAMILY, DEVICE_INFO_FAMILY, DEVICE_LEASE_FAMILY, DEVICE_STATUS_FAMILY,
    DeviceCollector, MODEM_INFO, REBOOT_COUNT_FAMILY, UPTIME_FAMILY,
};
pub use config::DeviceConfig;
pub use port_mapping::{PORT_MAPPINGS_FAMILY, PORT_MAPPINGS_PATH, PortMappingCollector};
pub use wifi::{WIFI_CHANNEL_FAMILY, WIFI_RADIOS_PATH, WIFI_SIGNAL_FAMILY, WifiCollector};
