//! Top-level application configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::collector::MIN_PERIOD;
use crate::collector::device::DeviceConfig;
use crate::collector::ping::LatencyConfig;
use crate::collector::public_ip::PublicIpConfig;
use crate::collector::speedtest::SpeedtestConfig;

use super::validation::{ConfigError, expand_env_vars, require_http_url, require_non_zero};

// =============================================================================
// Constants
// =============================================================================

/// Default period of the router, public IP and latency collectors (5 minutes).
pub const DEFAULT_COLLECTION_INTERVAL: Duration = Duration::from_secs(300);

/// Default period of the bandwidth benchmark (1 hour).
pub const DEFAULT_SPEEDTEST_INTERVAL: Duration = Duration::from_secs(3600);

/// Default upper bound for one router poll (1 minute).
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(60);

fn default_collection_interval() -> Duration {
    DEFAULT_COLLECTION_INTERVAL
}

fn default_speedtest_interval() -> Duration {
    DEFAULT_SPEEDTEST_INTERVAL
}

fn default_poll_timeout() -> Duration {
    DEFAULT_POLL_TIMEOUT
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Period of the router, public IP and latency collectors (default: 5m).
    #[serde(default = "default_collection_interval", with = "humantime_serde")]
    pub collection_interval: Duration,

    /// Period of the bandwidth benchmark (default: 1h).
    #[serde(default = "default_speedtest_interval", with = "humantime_serde")]
    pub speedtest_interval: Duration,

    /// Upper bound for one router poll (default: 60s).
    #[serde(default = "default_poll_timeout", with = "humantime_serde")]
    pub poll_timeout: Duration,

    /// Router connection. Router collectors are disabled when absent.
    #[serde(default)]
    pub device: Option<DeviceConfig>,

    /// Public IP lookup.
    #[serde(default)]
    pub public_ip: PublicIpConfig,

    /// Latency probe.
    #[serde(default)]
    pub latency: LatencyConfig,

    /// Bandwidth benchmark.
    #[serde(default)]
    pub speedtest: SpeedtestConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            collection_interval: DEFAULT_COLLECTION_INTERVAL,
            speedtest_interval: DEFAULT_SPEEDTEST_INTERVAL,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            device: None,
            public_ip: PublicIpConfig::default(),
            latency: LatencyConfig::default(),
            speedtest: SpeedtestConfig::default(),
        }
    }
}

/// Values supplied on the command line or through the environment.
///
/// Every field left `None` keeps the value from the file (or the default).
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub router_host: Option<String>,
    pub router_username: Option<String>,
    pub router_password: Option<String>,
    pub collection_interval: Option<Duration>,
    pub speedtest_interval: Option<Duration>,
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// `${VAR}` and `${VAR:-default}` references in string values are
    /// expanded after parsing.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_yaml(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from YAML text without validating it.
    ///
    /// # Errors
    /// Returns `ConfigError::ParseError` on malformed YAML.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        // An empty document means "all defaults".
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let mut config: Self = serde_yaml::from_str(content)?;
        config.expand_env();
        Ok(config)
    }

    /// Expand environment references in every string setting.
    ///
    /// Runs on parsed values, so expanded text is never read as YAML.
    fn expand_env(&mut self) {
        fn expand(value: &mut String) {
            *value = expand_env_vars(value);
        }

        if let Some(device) = self.device.as_mut() {
            expand(&mut device.host);
            expand(&mut device.username);
            expand(&mut device.password);
        }
        expand(&mut self.public_ip.url);
        expand(&mut self.latency.host);
        for server in &mut self.speedtest.servers {
            expand(&mut server.name);
            expand(&mut server.latency_url);
            expand(&mut server.download_url);
            expand(&mut server.upload_url);
        }
    }

    /// Apply command-line / environment overrides on top of this config.
    ///
    /// A router host creates the device section if the file had none.
    /// Credentials without any device section are ignored.
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(host) = overrides.router_host {
            match self.device.as_mut() {
                Some(device) => device.host = host,
                None => self.device = Some(DeviceConfig::new(host)),
            }
        }
        if let Some(device) = self.device.as_mut() {
            if let Some(username) = overrides.router_username {
                device.username = username;
            }
            if let Some(password) = overrides.router_password {
                device.password = password;
            }
        }
        if let Some(interval) = overrides.collection_interval {
            self.collection_interval = interval;
        }
        if let Some(interval) = overrides.speedtest_interval {
            self.speedtest_interval = interval;
        }
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_min_period("collection_interval", self.collection_interval)?;
        require_min_period("speedtest_interval", self.speedtest_interval)?;
        require_non_zero("poll_timeout", self.poll_timeout)?;

        if let Some(device) = &self.device {
            if device.host.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "device host must not be empty".to_string(),
                ));
            }
        }

        if self.public_ip.enabled {
            require_http_url("public_ip.url", &self.public_ip.url)?;
            require_non_zero("public_ip.timeout", self.public_ip.timeout)?;
        }

        if self.latency.enabled {
            if self.latency.host.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "latency host must not be empty".to_string(),
                ));
            }
            require_non_zero("latency.timeout", self.latency.timeout)?;
            if let Some(interval) = self.latency.interval {
                require_min_period("latency.interval", interval)?;
            }
        }

        if self.speedtest.enabled {
            require_non_zero("speedtest.timeout", self.speedtest.timeout)?;
            if self.speedtest.upload_bytes == 0 {
                return Err(ConfigError::ValidationError(
                    "speedtest upload_bytes must be positive".to_string(),
                ));
            }
            if self.speedtest.servers.is_empty() {
                return Err(ConfigError::ValidationError(
                    "speedtest requires at least one server".to_string(),
                ));
            }
            for server in &self.speedtest.servers {
                let field = format!("speedtest.servers[{}]", server.name);
                require_http_url(&field, &server.latency_url)?;
                require_http_url(&field, &server.download_url)?;
                require_http_url(&field, &server.upload_url)?;
            }
        }

        Ok(())
    }
}

fn require_min_period(field: &str, period: Duration) -> Result<(), ConfigError> {
    if period < MIN_PERIOD {
        return Err(ConfigError::ValidationError(format!(
            "{field} must be at least {}",
            humantime::format_duration(MIN_PERIOD)
        )));
    }
    Ok(())
}
