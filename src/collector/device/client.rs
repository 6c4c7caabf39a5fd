//! Abstract router capability consumed by the device collectors.
//!
//! The transport (JSON-RPC, SOAP, scraping) lives behind [`DeviceClient`];
//! collectors only see typed records and raw values fetched by path.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::collector::CollectorError;

/// Errors reported by a [`DeviceClient`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeviceError {
    /// Credentials rejected or session no longer valid.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Connection, TLS or timeout failure talking to the device.
    #[error("transport error: {0}")]
    Transport(String),

    /// The device does not expose the requested path.
    #[error("unsupported path: {0}")]
    UnsupportedPath(String),

    /// The device answered with something that could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl From<DeviceError> for CollectorError {
    fn from(e: DeviceError) -> Self {
        match e {
            DeviceError::Auth(msg) => Self::Auth(msg),
            DeviceError::Transport(msg) => Self::Network(msg),
            DeviceError::UnsupportedPath(path) => Self::Unsupported(path),
            DeviceError::Protocol(msg) => Self::Protocol(msg),
        }
    }
}

/// Opaque login session handed back by [`DeviceClient::login`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Session identifier or token, meaningful only to the client.
    pub token: String,
}

impl Session {
    /// Wrap a session token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

/// Router identity and counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceInfo {
    pub mac_address: String,
    pub build_date: String,
    pub model_name: String,
    pub serial_number: String,
    pub software_version: String,
    /// Seconds since boot.
    pub up_time: u64,
    pub reboot_count: u64,
}

/// One entry of the router's host / DHCP lease table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Host {
    /// Stable host identifier (usually the MAC address).
    pub id: String,
    pub name: Option<String>,
    pub host_name: Option<String>,
    pub alias: Option<String>,
    pub phys_address: Option<String>,
    pub ip_address: Option<String>,
    pub interface_type: Option<String>,
    pub layer1_interface: Option<String>,
    pub layer3_interface: Option<String>,
    pub active: bool,
    pub lease_start: i64,
    pub lease_duration: i64,
    pub lease_time_remaining: i64,
    pub blacklisted: bool,
    pub blacklisted_schedule: Vec<String>,
}

/// Router access used by the device collectors.
///
/// Implementations hold connection settings only; the login session is
/// cached by each collector and passed back on every call.
#[async_trait::async_trait]
pub trait DeviceClient: Send + Sync + 'static {
    /// Authenticate and open a new session.
    async fn login(&self) -> Result<Session, DeviceError>;

    /// Identity, uptime and reboot counter.
    async fn device_info(&self, session: &Session) -> Result<DeviceInfo, DeviceError>;

    /// Current host / lease table.
    async fn hosts(&self, session: &Session) -> Result<Vec<Host>, DeviceError>;

    /// Raw structured value at a device data-model path
    /// (e.g. `Device/NAT/PortMappings`).
    async fn value_by_path(
        &self,
        session: &Session,
        path: &str,
    ) -> Result<serde_json::Value, DeviceError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::ErrorKind;

    #[test]
    fn test_device_error_mapping() {
        let e: CollectorError = DeviceError::Auth("bad password".into()).into();
        assert_eq!(e.kind(), ErrorKind::Authentication);

        let e: CollectorError = DeviceError::UnsupportedPath("Device/WiFi/Radios".into()).into();
        assert_eq!(e.kind(), ErrorKind::UnsupportedFeature);
        assert!(e.to_string().contains("Device/WiFi/Radios"));

        let e: CollectorError = DeviceError::Transport("refused".into()).into();
        assert_eq!(e.kind(), ErrorKind::TransientNetwork);
    }

    #[test]
    fn test_host_deserialize_partial() {
        let host: Host = serde_json::from_value(serde_json::json!({
            "id": "AA:BB:CC:DD:EE:FF",
            "active": true,
            "lease_time_remaining": 3600
        }))
        .unwrap();
        assert_eq!(host.id, "AA:BB:CC:DD:EE:FF");
        assert!(host.active);
        assert_eq!(host.name, None);
        assert_eq!(host.lease_time_remaining, 3600);
    }
}
