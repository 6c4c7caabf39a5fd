//! Configuration module for modemwatch.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Polling cadence (collection interval, speedtest interval, poll timeout)
//! - Router connection (host, credentials, optional Wi-Fi / port mappings)
//! - Internet-side probes (public IP, latency, bandwidth benchmark)
//!
//! Command-line and environment values are applied on top through
//! [`ConfigOverrides`].

mod app;
mod validation;

pub use app::{AppConfig, ConfigOverrides};
pub use validation::{ConfigError, expand_env_vars, parse_duration, parse_interval};

// Re-export constants
pub use app::{DEFAULT_COLLECTION_INTERVAL, DEFAULT_POLL_TIMEOUT, DEFAULT_SPEEDTEST_INTERVAL};
