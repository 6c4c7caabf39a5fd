//! Router connection settings shared by the device collectors.

use serde::{Deserialize, Serialize};

fn default_username() -> String {
    "admin".to_string()
}

fn default_enabled() -> bool {
    true
}

/// Configuration for the router collectors.
#[derive(Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Router address (hostname or IP, optionally with scheme).
    pub host: String,
    /// Login user (default: "admin").
    #[serde(default = "default_username")]
    pub username: String,
    /// Login password. Supports `${VAR}` expansion at load time.
    #[serde(default)]
    pub password: String,
    /// Verify the router's TLS certificate (default: false).
    #[serde(default)]
    pub verify_ssl: bool,
    /// Collect Wi-Fi radio statistics (default: true).
    #[serde(default = "default_enabled")]
    pub wifi_enabled: bool,
    /// Collect NAT port mappings (default: true).
    #[serde(default = "default_enabled")]
    pub port_mappings_enabled: bool,
}

impl DeviceConfig {
    /// Create a device configuration for `host` with default credentials.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            username: default_username(),
            password: String::new(),
            verify_ssl: false,
            wifi_enabled: true,
            port_mappings_enabled: true,
        }
    }

    /// Set credentials.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Set TLS verification.
    pub fn with_verify_ssl(mut self, verify: bool) -> Self {
        self.verify_ssl = verify;
        self
    }
}

impl std::fmt::Debug for DeviceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceConfig")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("verify_ssl", &self.verify_ssl)
            .field("wifi_enabled", &self.wifi_enabled)
            .field("port_mappings_enabled", &self.port_mappings_enabled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_config_defaults() {
        let config: DeviceConfig = serde_yaml::from_str("host: 192.168.0.1").unwrap();
        assert_eq!(config.username, "admin");
        assert!(config.password.is_empty());
        assert!(!config.verify_ssl);
        assert!(config.wifi_enabled);
        assert!(config.port_mappings_enabled);
    }

    #[test]
    fn test_device_config_debug_redacts_password() {
        let config = DeviceConfig::new("192.168.0.1").with_credentials("admin", "hunter2");
        let printed = format!("{:?}", config);
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("<redacted>"));
    }
}
